use serde::Deserialize;

use crate::{
    error::PolicyError,
    feedback::{FeedbackHandle, FeedbackParams},
    replace::{fixed::DEFAULT_THRESHOLD, AdaptiveThreshold, FixedThreshold, Policy},
};

/// Which adaptive policies tune the same threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackScope {
    /// One controller for every shared policy made by the same builder.
    #[default]
    Shared,
    /// A controller of its own.
    Private,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Fixed {
        #[serde(default = "default_threshold")]
        threshold: u32,
    },
    Adaptive {
        #[serde(default)]
        scope: FeedbackScope,
        #[serde(default)]
        feedback: FeedbackParams,
    },
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub repl: PolicyConfig,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub caches: Vec<CacheConfig>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Config, PolicyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds one policy per cache, in config order.
    pub fn to_policies(self) -> Result<Vec<(String, Policy)>, PolicyError> {
        let mut builder = PolicyBuilder::new();
        let mut policies = Vec::with_capacity(self.caches.len());
        for cc in self.caches {
            let policy = builder.build(&cc.repl)?;
            policies.push((cc.name, policy));
        }
        Ok(policies)
    }
}

/// Turns configs into policies, handing out the shared controller.
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    shared: Option<FeedbackHandle>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        PolicyBuilder { shared: None }
    }

    /// Shared adaptive policies will tune `feedback` instead of a new controller.
    pub fn with_shared(feedback: FeedbackHandle) -> Self {
        PolicyBuilder {
            shared: Some(feedback),
        }
    }

    pub fn shared_feedback(&self) -> Option<&FeedbackHandle> {
        self.shared.as_ref()
    }

    pub fn build(&mut self, config: &PolicyConfig) -> Result<Policy, PolicyError> {
        let policy = match *config {
            PolicyConfig::Fixed { threshold } => FixedThreshold::new(threshold).into(),
            PolicyConfig::Adaptive {
                scope: FeedbackScope::Private,
                feedback,
            } => AdaptiveThreshold::new(feedback)?.into(),
            PolicyConfig::Adaptive {
                scope: FeedbackScope::Shared,
                feedback,
            } => AdaptiveThreshold::with_feedback(self.shared_handle(feedback)?).into(),
        };
        Ok(policy)
    }

    fn shared_handle(&mut self, params: FeedbackParams) -> Result<FeedbackHandle, PolicyError> {
        match &self.shared {
            Some(handle) if handle.params() != params => Err(PolicyError::SharedParamsConflict),
            Some(handle) => Ok(handle.clone()),
            None => {
                let handle = FeedbackHandle::new(params)?;
                self.shared = Some(handle.clone());
                Ok(handle)
            }
        }
    }
}
