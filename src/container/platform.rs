//! Target platform selection

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    pub os_version: String,
    pub os_features: Vec<String>,
    pub variant: String,
}

impl Platform {
    pub fn is_empty(&self) -> bool {
        self.architecture.is_empty() && self.os.is_empty()
    }
}

impl fmt::Display for Platform {
    /// `os/arch[/variant]`, the form accepted by `--platform`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = if self.os.is_empty() { "linux" } else { &self.os };
        write!(f, "{}", os)?;
        if !self.architecture.is_empty() {
            write!(f, "/{}", self.architecture)?;
            if !self.variant.is_empty() {
                write!(f, "/{}", self.variant)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display() {
        let platform = Platform {
            architecture: "arm64".to_string(),
            os: "linux".to_string(),
            variant: "v8".to_string(),
            ..Platform::default()
        };
        assert_eq!(platform.to_string(), "linux/arm64/v8");

        let platform = Platform {
            architecture: "amd64".to_string(),
            ..Platform::default()
        };
        assert_eq!(platform.to_string(), "linux/amd64");
        assert!(Platform::default().is_empty());
    }
}
