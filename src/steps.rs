//! Pipeline step identifiers and their display metadata.

use serde::{Deserialize, Serialize};

/// A stage of the remote chapter pipeline, as reported by progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Validating,
    Downloading,
    FilePrep,
    AudioAnalysis,
    VadPrep,
    VadAnalysis,
    PartialScanPrep,
    PartialAudioAnalysis,
    PartialVadAnalysis,
    AudioExtraction,
    Trimming,
    AsrProcessing,
    AiCleanup,
    /// Any step this client does not know about (including ones added later by the backend).
    #[serde(other)]
    Unknown,
}

/// Display metadata for a pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepInfo {
    pub title: &'static str,
    pub description: &'static str,
    /// Icon reference; resolving it to an actual glyph is up to the renderer.
    pub icon: &'static str,
}

const FALLBACK: StepInfo = StepInfo {
    title: "Processing",
    description: "Working...",
    icon: "loader",
};

/// Look up the display metadata for a step. Never fails.
pub fn describe(step: &PipelineStep) -> &'static StepInfo {
    match step {
        PipelineStep::Validating => &StepInfo {
            title: "Validating",
            description: "Checking the audiobook source...",
            icon: "shield-check",
        },
        PipelineStep::Downloading => &StepInfo {
            title: "Downloading",
            description: "Fetching the audiobook files...",
            icon: "download",
        },
        PipelineStep::FilePrep => &StepInfo {
            title: "Preparing Files",
            description: "Preparing audio files for analysis...",
            icon: "file-audio",
        },
        PipelineStep::AudioAnalysis => &StepInfo {
            title: "Analyzing Audio",
            description: "Looking for chapter cues in the audio...",
            icon: "audio-waveform",
        },
        PipelineStep::VadPrep => &StepInfo {
            title: "Preparing Voice Detection",
            description: "Preparing voice activity analysis...",
            icon: "settings",
        },
        PipelineStep::VadAnalysis => &StepInfo {
            title: "Detecting Speech",
            description: "Finding pauses between spoken sections...",
            icon: "mic",
        },
        PipelineStep::PartialScanPrep => &StepInfo {
            title: "Preparing Partial Scan",
            description: "Preparing to rescan the selected region...",
            icon: "scan",
        },
        PipelineStep::PartialAudioAnalysis => &StepInfo {
            title: "Rescanning Audio",
            description: "Looking for chapter cues in the selected region...",
            icon: "audio-waveform",
        },
        PipelineStep::PartialVadAnalysis => &StepInfo {
            title: "Rescanning Speech",
            description: "Finding pauses in the selected region...",
            icon: "mic",
        },
        PipelineStep::AudioExtraction => &StepInfo {
            title: "Extracting Chapters",
            description: "Cutting chapter segments from the audio...",
            icon: "scissors",
        },
        PipelineStep::Trimming => &StepInfo {
            title: "Trimming Segments",
            description: "Trimming chapter segments for transcription...",
            icon: "crop",
        },
        PipelineStep::AsrProcessing => &StepInfo {
            title: "Transcribing",
            description: "Transcribing chapter openings...",
            icon: "captions",
        },
        PipelineStep::AiCleanup => &StepInfo {
            title: "Cleaning Up Titles",
            description: "Tidying chapter titles with AI...",
            icon: "sparkles",
        },
        PipelineStep::Unknown => &FALLBACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_step_lookup() {
        let info = describe(&PipelineStep::Downloading);
        assert_eq!(info.title, "Downloading");
        assert_eq!(info.icon, "download");
    }

    #[test]
    fn test_unknown_step_from_wire_uses_fallback() {
        let step: PipelineStep = serde_json::from_str("\"chapter_merging\"").unwrap();
        assert_eq!(step, PipelineStep::Unknown);

        let info = describe(&step);
        assert_eq!(info.title, "Processing");
        assert_eq!(info.description, "Working...");
    }

    #[test]
    fn test_wire_names_are_snake_case() {
        let step: PipelineStep = serde_json::from_str("\"partial_vad_analysis\"").unwrap();
        assert_eq!(step, PipelineStep::PartialVadAnalysis);
        assert_eq!(
            serde_json::to_string(&PipelineStep::AsrProcessing).unwrap(),
            "\"asr_processing\""
        );
    }

    #[test]
    fn test_every_known_step_has_its_own_title() {
        let steps = [
            PipelineStep::Validating,
            PipelineStep::Downloading,
            PipelineStep::FilePrep,
            PipelineStep::AudioAnalysis,
            PipelineStep::VadPrep,
            PipelineStep::VadAnalysis,
            PipelineStep::PartialScanPrep,
            PipelineStep::PartialAudioAnalysis,
            PipelineStep::PartialVadAnalysis,
            PipelineStep::AudioExtraction,
            PipelineStep::Trimming,
            PipelineStep::AsrProcessing,
            PipelineStep::AiCleanup,
        ];
        for step in steps {
            assert_ne!(describe(&step).title, FALLBACK.title, "{:?}", step);
        }
    }
}
