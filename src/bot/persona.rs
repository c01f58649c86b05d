//! Persona (system prompt) loading.

use std::path::Path;

use tracing::{info, warn};

/// Persona used when no context file is given or it cannot be read.
pub const DEFAULT_PERSONA: &str =
    "You are a helpful AI assistant participating in a group chat. Keep your responses concise.";

/// Load the persona from `path`, falling back to [`DEFAULT_PERSONA`].
pub fn load_persona(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_PERSONA.to_string();
    };

    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            info!("Loaded persona from {}", path.display());
            content.trim().to_string()
        }
        Ok(_) => {
            warn!("Persona file {} is empty, using default", path.display());
            DEFAULT_PERSONA.to_string()
        }
        Err(e) => {
            warn!(
                "Failed to read persona file {}: {}, using default",
                path.display(),
                e
            );
            DEFAULT_PERSONA.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_no_path_uses_default() {
        assert_eq!(load_persona(None), DEFAULT_PERSONA);
    }

    #[test]
    fn test_loads_and_trims_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\n  You are a pirate. Answer in pirate speak.  \n").unwrap();

        assert_eq!(
            load_persona(Some(file.path())),
            "You are a pirate. Answer in pirate speak."
        );
    }

    #[test]
    fn test_missing_file_uses_default() {
        let path = Path::new("/nonexistent/persona.txt");
        assert_eq!(load_persona(Some(path)), DEFAULT_PERSONA);
    }

    #[test]
    fn test_blank_file_uses_default() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(load_persona(Some(file.path())), DEFAULT_PERSONA);
    }
}
