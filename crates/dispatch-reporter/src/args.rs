//! Parses the compute-side reporter's command-line contract: `[program, input_job_id,
//! "cfg_file=<path>"?, "job_id=<backend_id>"?]`.

/// Fields extracted from argv, before any config file has been read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReporterArgs {
    pub input_job_id: String,
    pub cfg_file: Option<String>,
    pub job_id: Option<String>,
}

impl ReporterArgs {
    /// Parses `args`, excluding `args[0]` (the program name) the way the original
    /// reporter does.
    pub fn parse(args: &[String]) -> Option<Self> {
        let input_job_id = args.get(1)?.clone();
        let mut parsed = ReporterArgs {
            input_job_id,
            cfg_file: None,
            job_id: None,
        };
        for arg in &args[2.min(args.len())..] {
            if let Some(value) = arg.strip_prefix("cfg_file=") {
                parsed.cfg_file = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("job_id=") {
                parsed.job_id = Some(value.to_string());
            }
        }
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let args = vec!["job.py".to_string(), "A1".to_string()];
        let parsed = ReporterArgs::parse(&args).unwrap();
        assert_eq!(parsed.input_job_id, "A1");
        assert!(parsed.cfg_file.is_none());
        assert!(parsed.job_id.is_none());
    }

    #[test]
    fn parses_cfg_file_and_job_id() {
        let args = vec![
            "job.py".to_string(),
            "A1".to_string(),
            "cfg_file=/tmp/a1.json".to_string(),
            "job_id=42".to_string(),
        ];
        let parsed = ReporterArgs::parse(&args).unwrap();
        assert_eq!(parsed.cfg_file, Some("/tmp/a1.json".to_string()));
        assert_eq!(parsed.job_id, Some("42".to_string()));
    }

    #[test]
    fn missing_input_job_id_is_none() {
        let args = vec!["job.py".to_string()];
        assert!(ReporterArgs::parse(&args).is_none());
    }
}
