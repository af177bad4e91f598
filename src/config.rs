use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, io::Read, path::Path};

/// Describes how to launch the external encoder process.
///
/// Every string is a handlebars template rendered against the session: see
/// [`crate::process::ProcessEncoderFactory`] for the available variables.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EncoderConfig {
    pub command: String,
    /// Arguments placed before any destination.
    pub args: Vec<String>,
    pub envs: HashMap<String, String>,
    /// Appended once per RTMP destination, with `{{destination}}` set.
    pub rtmp_args: Vec<String>,
    /// Appended once per MPEG-TS destination, with `{{destination}}` set.
    pub mpegts_args: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let args = [
            "-hide_banner",
            "-nostdin",
            "{{#if (eq protocol \"rtmp\")}}-listen{{/if}}",
            "{{#if (eq protocol \"rtmp\")}}1{{/if}}",
            "-i",
            "{{listen_uri}}",
        ];
        let rtmp_args = ["-map", "0", "-c", "copy", "-f", "flv", "{{destination}}"];
        let mpegts_args = ["-map", "0", "-c", "copy", "-f", "mpegts", "{{destination}}"];

        Self {
            command: "ffmpeg".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            envs: HashMap::new(),
            rtmp_args: rtmp_args.iter().map(|s| s.to_string()).collect(),
            mpegts_args: mpegts_args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EncoderConfig {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read encoder config from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Parses configuration from any reader, e.g. stdin or an embedded file.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .context("read encoder config")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("parse encoder config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            command = "/usr/local/bin/ffmpeg"
            args = ["-i", "{{listen_uri}}"]
            rtmp_args = ["-f", "flv", "{{destination}}"]
            mpegts_args = []

            [envs]
            FFREPORT = "file=/tmp/{{stream_id}}.log"
        "#;
        let cfg = EncoderConfig::from_reader(toml.as_bytes()).unwrap();
        assert_eq!(cfg.command, "/usr/local/bin/ffmpeg");
        assert_eq!(cfg.args, vec!["-i", "{{listen_uri}}"]);
        assert_eq!(cfg.rtmp_args.len(), 3);
        assert!(cfg.mpegts_args.is_empty());
        assert_eq!(cfg.envs["FFREPORT"], "file=/tmp/{{stream_id}}.log");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = EncoderConfig::from_reader(r#"command = "gst-launch""#.as_bytes()).unwrap();
        let defaults = EncoderConfig::default();
        assert_eq!(cfg.command, "gst-launch");
        assert_eq!(cfg.args, defaults.args);
        assert_eq!(cfg.mpegts_args, defaults.mpegts_args);
    }

    #[test]
    fn rejects_bad_toml() {
        let err = EncoderConfig::from_reader("command = [".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("parse encoder config"));
    }

    #[test]
    fn demo_config_parses() {
        let cfg = EncoderConfig::from_reader(include_str!("../demos/encoder.toml").as_bytes()).unwrap();
        assert_eq!(cfg.command, "ffmpeg");
        assert!(cfg.args.contains(&"{{listen_uri}}".to_string()));
        assert!(cfg.envs.contains_key("FFREPORT"));
    }

    #[test]
    fn from_reader_reports_read_errors() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }

        let err = EncoderConfig::from_reader(Broken).unwrap_err();
        assert_eq!(err.to_string(), "read encoder config");
    }

    #[test]
    fn load_reports_path() {
        let err = EncoderConfig::load("/nonexistent/streamvisor.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/streamvisor.toml"));
    }
}
