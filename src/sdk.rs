//! Capability set of the managed HQ SDK
//!
//! [`HqSdk`] is the statically checked replacement for looking up `HQSdk`
//! methods by name on every call. [`crate::jvm::JniSdk`] implements it over JNI.

use crate::error::BridgeError;
use crate::types::ManagedGroup;

/// Operations provided by the managed SDK
///
/// Methods return raw managed results: `None` stands for a managed `null`.
/// Normalization into caller-facing values happens in [`crate::bridge::Bridge`].
pub trait HqSdk: Send + Sync {
    /// Toggle SDK debug output
    fn enable_debug(&self, enabled: bool) -> Result<(), BridgeError>;

    /// Initialize the SDK with a key
    fn init(&self, key: &str, debug: bool, background_tasks: bool) -> Result<(), BridgeError>;

    /// Start SDK jobs (installed apps collection)
    fn start(&self) -> Result<(), BridgeError>;

    /// Log a custom event
    fn log_event(&self, name: &str, data: &str) -> Result<(), BridgeError>;

    /// Fetch predicted user groups synchronously
    fn user_groups(&self) -> Result<Option<Vec<Option<ManagedGroup>>>, BridgeError>;

    /// Ask for the user's collected data to be sent to `email`
    fn request_user_data(&self, email: &str) -> Result<(), BridgeError>;

    /// Delete the user's collected data
    fn delete_user_data(&self) -> Result<(), BridgeError>;

    /// SDK-assigned user identifier
    fn uuid(&self) -> Result<Option<String>, BridgeError>;

    /// Whether `enable_debug` maps to a managed method
    fn supports_debug_toggle(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory `HqSdk` that records every call

    use std::sync::{Arc, Mutex};

    use super::HqSdk;
    use crate::error::BridgeError;
    use crate::types::ManagedGroup;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        EnableDebug(bool),
        Init {
            key: String,
            debug: bool,
            background_tasks: bool,
        },
        Start,
        LogEvent(String, String),
        UserGroups,
        RequestUserData(String),
        DeleteUserData,
        Uuid,
    }

    #[derive(Default)]
    struct State {
        calls: Vec<Call>,
        groups: Option<Vec<Option<ManagedGroup>>>,
        uuid: Option<String>,
        fail: bool,
    }

    /// Cloneable handle; clones share recorded state.
    #[derive(Clone, Default)]
    pub struct RecordingSdk {
        state: Arc<Mutex<State>>,
    }

    impl RecordingSdk {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_groups(self, groups: Option<Vec<Option<ManagedGroup>>>) -> Self {
            self.state.lock().unwrap().groups = groups;
            self
        }

        pub fn with_uuid(self, uuid: Option<&str>) -> Self {
            self.state.lock().unwrap().uuid = uuid.map(str::to_string);
            self
        }

        /// Make every call fail as if the managed side had thrown.
        pub fn failing(self) -> Self {
            self.state.lock().unwrap().fail = true;
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn record(&self, call: Call, operation: &'static str) -> Result<(), BridgeError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if state.fail {
                return Err(BridgeError::ManagedException(operation));
            }
            Ok(())
        }
    }

    impl HqSdk for RecordingSdk {
        fn enable_debug(&self, enabled: bool) -> Result<(), BridgeError> {
            self.record(Call::EnableDebug(enabled), "enable_debug")
        }

        fn init(&self, key: &str, debug: bool, background_tasks: bool) -> Result<(), BridgeError> {
            self.record(
                Call::Init {
                    key: key.to_string(),
                    debug,
                    background_tasks,
                },
                "init",
            )
        }

        fn start(&self) -> Result<(), BridgeError> {
            self.record(Call::Start, "start")
        }

        fn log_event(&self, name: &str, data: &str) -> Result<(), BridgeError> {
            self.record(Call::LogEvent(name.to_string(), data.to_string()), "log_event")
        }

        fn user_groups(&self) -> Result<Option<Vec<Option<ManagedGroup>>>, BridgeError> {
            self.record(Call::UserGroups, "user_groups")?;
            Ok(self.state.lock().unwrap().groups.clone())
        }

        fn request_user_data(&self, email: &str) -> Result<(), BridgeError> {
            self.record(Call::RequestUserData(email.to_string()), "request_user_data")
        }

        fn delete_user_data(&self) -> Result<(), BridgeError> {
            self.record(Call::DeleteUserData, "delete_user_data")
        }

        fn uuid(&self) -> Result<Option<String>, BridgeError> {
            self.record(Call::Uuid, "uuid")?;
            Ok(self.state.lock().unwrap().uuid.clone())
        }
    }
}
