use super::names;
use crate::credentials::Binding;
use crate::error::Result;
use crate::invoker::ToolInvocation;
use crate::stage::{Stage, StageEnv};

/// The scanner picks its token up from this variable
const SCANNER_TOKEN: &str = "SONAR_TOKEN";

/// Static analysis against the configured scanner host
pub struct Scan;

impl Stage for Scan {
    fn name(&self) -> &'static str {
        names::SCAN
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        let bindings = [Binding::secret(&env.config.credentials.scanner, SCANNER_TOKEN)];
        let invocation = ToolInvocation::new("${SCANNER}")
            .arg("-Dsonar.projectKey=${SCANNER_PROJECT_KEY}")
            .arg(format!("-Dsonar.java.binaries={}", env.config.scanner_binaries))
            .arg("-Dsonar.host.url=${SCANNER_HOST_URL}");

        env.with_credentials(&bindings, |scope| env.run_with(scope, &invocation))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::service::LogBufferService;
    use crate::testing::{ScriptedInvoker, StageHarness};

    #[test]
    fn test_scan_passes_token_masked() {
        let harness = StageHarness::new(ScriptedInvoker::new());
        Scan.execute(&harness.env()).unwrap();

        let calls = harness.invoker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].line,
            "sonar-scanner -Dsonar.projectKey=orders -Dsonar.java.binaries=target/classes \
             -Dsonar.host.url=http://localhost:9000"
        );
        assert_eq!(calls[0].env.get(SCANNER_TOKEN).unwrap(), "s3cr3t-token");

        let log = harness.log.drain();
        assert!(log.iter().all(|e| !e.message.contains("s3cr3t-token")));
    }

    #[test]
    fn test_token_not_visible_after_scan() {
        let harness = StageHarness::new(ScriptedInvoker::new());
        Scan.execute(&harness.env()).unwrap();
        assert!(!harness.context.contains(SCANNER_TOKEN));
    }

    #[test]
    fn test_scan_failure() {
        let harness = StageHarness::new(ScriptedInvoker::new().fail_on("sonar-scanner", 2));
        let err = Scan.execute(&harness.env()).unwrap_err();
        assert!(matches!(err, PipelineError::ToolExecution { exit_code: 2, .. }));
    }
}
