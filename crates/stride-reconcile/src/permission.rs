//! Permission negotiation.
//!
//! Query, and while the platform still allows it, prompt and query again.
//! The loop is capped by [`PermissionPolicy::max_prompts`] so a platform
//! that keeps answering "not granted, ask again" cannot spin forever.

use stride_platform::StepSensor;
use tracing::{debug, info};

use crate::error::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionPolicy {
    /// Upper bound on prompts per activation. Zero never prompts.
    pub max_prompts: u32,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self { max_prompts: 3 }
    }
}

/// Ensure motion permission is granted.
///
/// Returns the number of prompts shown on success.
pub async fn negotiate_permission(
    sensor: &dyn StepSensor,
    policy: PermissionPolicy,
) -> Result<u32, EngineError> {
    let mut prompts = 0u32;

    loop {
        let status = sensor.get_permissions().await?;
        debug!(granted = status.granted, can_ask_again = status.can_ask_again, prompts, "permission status");

        if status.granted {
            return Ok(prompts);
        }
        if !status.can_ask_again || prompts >= policy.max_prompts {
            return Err(EngineError::PermissionDenied {
                prompts,
                can_ask_again: status.can_ask_again,
            });
        }

        prompts += 1;
        info!(prompt = prompts, "requesting motion permission");
        let answer = sensor.request_permissions().await?;
        if answer.granted {
            return Ok(prompts);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use stride_platform::{PlatformError, Watch};
    use stride_schemas::{PermissionStatus, SubscriptionId};

    use super::*;

    /// Sensor whose permission answers are scripted.
    struct ScriptedSensor {
        current: Mutex<PermissionStatus>,
        answers: Mutex<VecDeque<PermissionStatus>>,
        requests: Mutex<u32>,
    }

    impl ScriptedSensor {
        fn new(current: PermissionStatus, answers: Vec<PermissionStatus>) -> Self {
            Self {
                current: Mutex::new(current),
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(0),
            }
        }

        fn requests(&self) -> u32 {
            *self.requests.lock().unwrap()
        }
    }

    #[async_trait]
    impl StepSensor for ScriptedSensor {
        async fn is_available(&self) -> Result<bool, PlatformError> {
            Ok(true)
        }

        async fn get_permissions(&self) -> Result<PermissionStatus, PlatformError> {
            Ok(*self.current.lock().unwrap())
        }

        async fn request_permissions(&self) -> Result<PermissionStatus, PlatformError> {
            *self.requests.lock().unwrap() += 1;
            let mut current = self.current.lock().unwrap();
            if let Some(next) = self.answers.lock().unwrap().pop_front() {
                *current = next;
            }
            Ok(*current)
        }

        fn supports_history(&self) -> bool {
            false
        }

        fn watch(&self) -> Result<Watch, PlatformError> {
            Err(PlatformError::Unavailable("not used".to_string()))
        }

        fn release(&self, _id: SubscriptionId) {}
    }

    #[tokio::test]
    async fn already_granted_needs_no_prompt() {
        let s = ScriptedSensor::new(PermissionStatus::granted(), vec![]);
        assert_eq!(negotiate_permission(&s, PermissionPolicy::default()).await, Ok(0));
        assert_eq!(s.requests(), 0);
    }

    #[tokio::test]
    async fn askable_then_granted_proceeds() {
        let s = ScriptedSensor::new(PermissionStatus::askable(), vec![PermissionStatus::granted()]);
        assert_eq!(negotiate_permission(&s, PermissionPolicy::default()).await, Ok(1));
    }

    #[tokio::test]
    async fn blocked_aborts_without_prompting() {
        let s = ScriptedSensor::new(PermissionStatus::blocked(), vec![]);
        let err = negotiate_permission(&s, PermissionPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PermissionDenied {
                prompts: 0,
                can_ask_again: false
            }
        );
        assert_eq!(s.requests(), 0);
    }

    #[tokio::test]
    async fn endless_ask_again_is_capped() {
        // Every prompt is dismissed but the platform keeps allowing more.
        let s = ScriptedSensor::new(PermissionStatus::askable(), vec![]);
        let err = negotiate_permission(&s, PermissionPolicy { max_prompts: 4 })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PermissionDenied {
                prompts: 4,
                can_ask_again: true
            }
        );
        assert_eq!(s.requests(), 4);
    }

    #[tokio::test]
    async fn denial_that_blocks_further_prompts_stops_the_loop() {
        let s = ScriptedSensor::new(PermissionStatus::askable(), vec![PermissionStatus::blocked()]);
        let err = negotiate_permission(&s, PermissionPolicy::default())
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(s.requests(), 1);
    }
}
