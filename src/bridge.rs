//! Rust-facing bridge API
//!
//! [`Bridge`] forwards each operation to an [`HqSdk`] and normalizes managed
//! nulls into caller-facing values.

use log::{debug, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::sdk::HqSdk;
use crate::types::UserGroupList;

/// Bound bridge over one SDK backend
pub struct Bridge {
    sdk: Box<dyn HqSdk>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(sdk: impl HqSdk + 'static, config: BridgeConfig) -> Self {
        Self {
            sdk: Box::new(sdk),
            config,
        }
    }

    /// Initialize the SDK.
    ///
    /// Debug output is toggled first, then the SDK is initialized with the
    /// same flag and the configured background task policy.
    pub fn init(&self, key: &str, debug: bool) -> Result<(), BridgeError> {
        if key.is_empty() {
            warn!("init called with an empty SDK key");
        }
        debug!("init (debug: {debug}, background_tasks: {})", self.config.background_tasks);

        if self.sdk.supports_debug_toggle() {
            self.sdk.enable_debug(debug)?;
        }
        self.sdk.init(key, debug, self.config.background_tasks)
    }

    /// Start SDK jobs
    pub fn start(&self) -> Result<(), BridgeError> {
        debug!("start");
        self.sdk.start()
    }

    /// Log a custom event; `data` is passed through untouched (often JSON).
    pub fn log(&self, name: &str, data: &str) -> Result<(), BridgeError> {
        debug!("log_event '{name}' ({} bytes)", data.len());
        self.sdk.log_event(name, data)
    }

    /// Fetch predicted user groups.
    ///
    /// A null managed list yields an empty list; null elements yield empty
    /// groups at the same index.
    pub fn user_groups(&self) -> Result<UserGroupList, BridgeError> {
        let managed = self.sdk.user_groups()?;

        match &managed {
            None => warn!("managed user group list was null"),
            Some(items) => {
                let nulls = items.iter().filter(|item| item.is_none()).count();
                if nulls > 0 {
                    warn!("{nulls} of {} managed user groups were null", items.len());
                }
            }
        }

        let groups = UserGroupList::from_managed(managed);
        debug!("user_groups returned {} groups", groups.len());
        Ok(groups)
    }

    pub fn request_user_data(&self, email: &str) -> Result<(), BridgeError> {
        debug!("request_user_data");
        self.sdk.request_user_data(email)
    }

    pub fn delete_user_data(&self) -> Result<(), BridgeError> {
        debug!("delete_user_data");
        self.sdk.delete_user_data()
    }

    /// SDK user identifier, empty when the managed side returns null
    pub fn uuid(&self) -> Result<String, BridgeError> {
        let uuid = self.sdk.uuid()?;
        if uuid.is_none() {
            debug!("managed uuid was null");
        }
        Ok(uuid.unwrap_or_default())
    }

    /// The SDK user identifier parsed as a UUID
    pub fn device_uuid(&self) -> Result<Option<Uuid>, BridgeError> {
        let raw = self.uuid()?;
        if raw.is_empty() {
            return Ok(None);
        }
        match Uuid::parse_str(&raw) {
            Ok(uuid) => Ok(Some(uuid)),
            Err(e) => {
                warn!("managed uuid '{raw}' is not a UUID: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::fake::{Call, RecordingSdk};
    use crate::types::{ManagedGroup, UserGroup};
    use pretty_assertions::assert_eq;

    fn group(id: &str, name: &str) -> Option<ManagedGroup> {
        Some(ManagedGroup {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
        })
    }

    #[test]
    fn test_init_forwards_debug_flag_to_both_calls() {
        for debug in [true, false] {
            let sdk = RecordingSdk::new();
            let bridge = Bridge::new(sdk.clone(), BridgeConfig::default());

            bridge.init("38e44d7", debug).unwrap();

            assert_eq!(
                sdk.calls(),
                vec![
                    Call::EnableDebug(debug),
                    Call::Init {
                        key: "38e44d7".to_string(),
                        debug,
                        background_tasks: true,
                    },
                ]
            );
        }
    }

    #[test]
    fn test_init_uses_configured_background_policy() {
        let sdk = RecordingSdk::new();
        let config = BridgeConfig {
            background_tasks: false,
            ..BridgeConfig::default()
        };
        let bridge = Bridge::new(sdk.clone(), config);

        bridge.init("key", false).unwrap();

        assert!(sdk.calls().contains(&Call::Init {
            key: "key".to_string(),
            debug: false,
            background_tasks: false,
        }));
    }

    #[test]
    fn test_user_groups_well_formed() {
        let sdk = RecordingSdk::new().with_groups(Some(vec![
            group("1", "Gamers"),
            group("2", "Readers"),
        ]));
        let bridge = Bridge::new(sdk, BridgeConfig::default());

        let groups = bridge.user_groups().unwrap();
        assert_eq!(
            groups.into_vec(),
            vec![UserGroup::new("1", "Gamers"), UserGroup::new("2", "Readers")]
        );
    }

    #[test]
    fn test_user_groups_null_and_empty_lists() {
        for managed in [None, Some(Vec::new())] {
            let sdk = RecordingSdk::new().with_groups(managed);
            let bridge = Bridge::new(sdk, BridgeConfig::default());
            assert!(bridge.user_groups().unwrap().is_empty());
        }
    }

    #[test]
    fn test_user_groups_null_element() {
        let sdk = RecordingSdk::new().with_groups(Some(vec![None, group("x", "X")]));
        let bridge = Bridge::new(sdk, BridgeConfig::default());

        let groups = bridge.user_groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.get(0), Some(&UserGroup::default()));
    }

    #[test]
    fn test_uuid_null_is_empty() {
        let bridge = Bridge::new(RecordingSdk::new(), BridgeConfig::default());
        assert_eq!(bridge.uuid().unwrap(), "");
        assert_eq!(bridge.device_uuid().unwrap(), None);
    }

    #[test]
    fn test_device_uuid_parses() {
        let id = Uuid::new_v4();
        let sdk = RecordingSdk::new().with_uuid(Some(&id.to_string()));
        let bridge = Bridge::new(sdk, BridgeConfig::default());
        assert_eq!(bridge.device_uuid().unwrap(), Some(id));

        let sdk = RecordingSdk::new().with_uuid(Some("not-a-uuid"));
        let bridge = Bridge::new(sdk, BridgeConfig::default());
        assert_eq!(bridge.uuid().unwrap(), "not-a-uuid");
        assert_eq!(bridge.device_uuid().unwrap(), None);
    }

    #[test]
    fn test_forwarding_calls() {
        let sdk = RecordingSdk::new();
        let bridge = Bridge::new(sdk.clone(), BridgeConfig::default());

        bridge.start().unwrap();
        bridge
            .log("test", r#"{"text": "sdl_test", "event": "app_start"}"#)
            .unwrap();
        bridge.request_user_data("player@example.com").unwrap();
        bridge.delete_user_data().unwrap();

        assert_eq!(
            sdk.calls(),
            vec![
                Call::Start,
                Call::LogEvent(
                    "test".to_string(),
                    r#"{"text": "sdl_test", "event": "app_start"}"#.to_string()
                ),
                Call::RequestUserData("player@example.com".to_string()),
                Call::DeleteUserData,
            ]
        );
    }

    #[test]
    fn test_errors_propagate() {
        let bridge = Bridge::new(RecordingSdk::new().failing(), BridgeConfig::default());
        assert!(matches!(
            bridge.start(),
            Err(BridgeError::ManagedException("start"))
        ));
        assert!(bridge.user_groups().is_err());
        assert!(bridge.uuid().is_err());
    }
}
