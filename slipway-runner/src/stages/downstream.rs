use slipway_core::dto::trigger::TriggerPipeline;

use super::names;
use crate::context::keys;
use crate::error::Result;
use crate::stage::{Stage, StageEnv};

/// Starts the downstream pipeline for the published image
///
/// The image is the `IMAGE_REFERENCE` published by compute-environment.
/// Never waits on the trigger. The stage succeeds as soon as the request has
/// been handed to the dispatcher.
pub struct TriggerDownstream;

impl Stage for TriggerDownstream {
    fn name(&self) -> &'static str {
        names::TRIGGER_DOWNSTREAM
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        let image = env.context.get(keys::IMAGE_REFERENCE)?;
        let req = TriggerPipeline::downstream(
            &env.config.downstream_pipeline,
            env.params,
            image.as_str(),
        );

        env.info(format!(
            "Triggering '{}' for {} (not waiting)",
            req.pipeline, image
        ));
        env.dispatch(req);
        Ok(())
    }
}
