//! Names of the external programs the pipeline invokes.

use serde::{Deserialize, Serialize};

fn default_frame_extractor() -> String {
    "sfextract".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_reconstruction_script() -> String {
    "mast3r_glomap_cli.py".to_string()
}

fn default_reconstruction_model() -> String {
    "MASt3R_ViTLarge_BaseDecoder_512_catmlpdpt_metric".to_string()
}

fn default_process_data() -> String {
    "ns-process-data".to_string()
}

fn default_train() -> String {
    "ns-train".to_string()
}

fn default_export() -> String {
    "ns-export".to_string()
}

/// Program names, resolved through `PATH` at spawn time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPrograms {
    /// Frame extractor.
    #[serde(default = "default_frame_extractor")]
    pub frame_extractor: String,
    /// Interpreter used to launch the reconstruction script.
    #[serde(default = "default_python")]
    pub python: String,
    /// Reconstruction entry point script.
    #[serde(default = "default_reconstruction_script")]
    pub reconstruction_script: String,
    /// Checkpoint name passed to the reconstruction script.
    #[serde(default = "default_reconstruction_model")]
    pub reconstruction_model: String,
    /// Training data preparation.
    #[serde(default = "default_process_data")]
    pub process_data: String,
    /// Trainer.
    #[serde(default = "default_train")]
    pub train: String,
    /// Exporter.
    #[serde(default = "default_export")]
    pub export: String,
}

impl Default for ToolPrograms {
    fn default() -> Self {
        Self {
            frame_extractor: default_frame_extractor(),
            python: default_python(),
            reconstruction_script: default_reconstruction_script(),
            reconstruction_model: default_reconstruction_model(),
            process_data: default_process_data(),
            train: default_train(),
            export: default_export(),
        }
    }
}

impl ToolPrograms {
    /// Sets the frame extractor program.
    #[must_use]
    pub fn with_frame_extractor(mut self, program: impl Into<String>) -> Self {
        self.frame_extractor = program.into();
        self
    }

    /// Sets the Python interpreter.
    #[must_use]
    pub fn with_python(mut self, program: impl Into<String>) -> Self {
        self.python = program.into();
        self
    }

    /// Sets the reconstruction script path.
    #[must_use]
    pub fn with_reconstruction_script(mut self, script: impl Into<String>) -> Self {
        self.reconstruction_script = script.into();
        self
    }

    /// Sets the three training toolkit programs.
    #[must_use]
    pub fn with_training_toolkit(
        mut self,
        process_data: impl Into<String>,
        train: impl Into<String>,
        export: impl Into<String>,
    ) -> Self {
        self.process_data = process_data.into();
        self.train = train.into();
        self.export = export.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let programs = ToolPrograms::default();
        assert_eq!(programs.frame_extractor, "sfextract");
        assert_eq!(programs.python, "python");
        assert_eq!(programs.train, "ns-train");
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let programs: ToolPrograms =
            serde_json::from_str(r#"{"python": "/opt/mast3r/bin/python"}"#).unwrap();
        assert_eq!(programs.python, "/opt/mast3r/bin/python");
        assert_eq!(programs.export, "ns-export");
        assert_eq!(programs.reconstruction_script, "mast3r_glomap_cli.py");
    }
}
