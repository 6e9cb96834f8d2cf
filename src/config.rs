//! Managed SDK contract and bridge configuration
//!
//! The contract names every class, method and field the bridge touches on the
//! managed side. Names are configurable so the bridge can follow SDK renames,
//! but JNI type signatures are fixed per role: the argument marshaling in
//! [`crate::jvm`] is written against them, so a mismatched name must fail lookup
//! rather than reach a method with a different shape.

use std::str::FromStr;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// JNI type signatures used by the bridge, keyed by role
pub mod signatures {
    pub const ENABLE_DEBUG: &str = "(Z)V";
    pub const INIT_KEY_DEBUG: &str = "(Landroid/content/Context;Ljava/lang/String;Z)V";
    pub const INIT_KEY_BACKGROUND_DEBUG: &str =
        "(Landroid/content/Context;Ljava/lang/String;ZZ)V";
    pub const START: &str = "(Landroid/content/Context;)V";
    pub const LOG_EVENT: &str = "(Ljava/lang/String;Ljava/lang/String;)V";
    pub const USER_GROUPS: &str = "()Ljava/util/List;";
    pub const REQUEST_USER_DATA: &str = "(Ljava/lang/String;)V";
    pub const DELETE_USER_DATA: &str = "()V";
    pub const UUID: &str = "()Ljava/lang/String;";
    pub const LIST_GET: &str = "(I)Ljava/lang/Object;";
    pub const LIST_SIZE: &str = "()I";
    pub const STRING_FIELD: &str = "Ljava/lang/String;";
    pub const GET_CLASS_LOADER: &str = "()Ljava/lang/ClassLoader;";
    pub const LOAD_CLASS: &str = "(Ljava/lang/String;)Ljava/lang/Class;";
}

/// Known builds of the managed SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkFlavor {
    /// `io.humanteq.hq_core`
    #[default]
    Core,
    /// `io.humanteq.hqsdk_core_legacy`
    Legacy,
}

impl SdkFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkFlavor::Core => "core",
            SdkFlavor::Legacy => "legacy",
        }
    }

    /// Contract preset for this flavor
    pub fn contract(&self) -> SdkContract {
        match self {
            SdkFlavor::Core => SdkContract {
                sdk_class: "io/humanteq/hq_core/HQSdk".to_string(),
                list_class: "java/util/List".to_string(),
                group_class: "io/humanteq/hq_core/models/UserGroup".to_string(),
                group_id_field: "segment_id".to_string(),
                group_name_field: "segment_name".to_string(),
                init_layout: InitLayout::KeyDebug,
                methods: MethodNames {
                    enable_debug: Some("enableDebug".to_string()),
                    init: "init".to_string(),
                    start: "start".to_string(),
                    log_event: "logEvent".to_string(),
                    user_groups: "getUserGroupsSync".to_string(),
                    request_user_data: Some("requestUserData".to_string()),
                    delete_user_data: Some("deleteUserData".to_string()),
                    uuid: Some("getUuid".to_string()),
                },
            },
            SdkFlavor::Legacy => SdkContract {
                sdk_class: "io/humanteq/hqsdk_core_legacy/HQSdk".to_string(),
                list_class: "java/util/List".to_string(),
                group_class: "io/humanteq/hqsdk_core_legacy/models/GroupResponse".to_string(),
                group_id_field: "segment_id".to_string(),
                group_name_field: "segment_name".to_string(),
                init_layout: InitLayout::KeyBackgroundDebug,
                methods: MethodNames {
                    enable_debug: Some("enableDebug".to_string()),
                    init: "init".to_string(),
                    start: "collectApps".to_string(),
                    log_event: "logEvent".to_string(),
                    user_groups: "getUserGroupsSync".to_string(),
                    request_user_data: None,
                    delete_user_data: None,
                    uuid: None,
                },
            },
        }
    }
}

impl FromStr for SdkFlavor {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "core" => Ok(SdkFlavor::Core),
            "legacy" => Ok(SdkFlavor::Legacy),
            other => Err(BridgeError::InvalidConfig(format!(
                "unknown SDK flavor '{other}'"
            ))),
        }
    }
}

/// Argument layout of the managed `init` method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitLayout {
    /// `init(Context, String key, boolean debug)`
    KeyDebug,
    /// `init(Context, String key, boolean backgroundDisabled, boolean debug)`
    KeyBackgroundDebug,
}

impl InitLayout {
    pub fn signature(&self) -> &'static str {
        match self {
            InitLayout::KeyDebug => signatures::INIT_KEY_DEBUG,
            InitLayout::KeyBackgroundDebug => signatures::INIT_KEY_BACKGROUND_DEBUG,
        }
    }
}

/// Static method names on the SDK class. `None` marks a method the flavor lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodNames {
    #[serde(default)]
    pub enable_debug: Option<String>,
    pub init: String,
    pub start: String,
    pub log_event: String,
    pub user_groups: String,
    #[serde(default)]
    pub request_user_data: Option<String>,
    #[serde(default)]
    pub delete_user_data: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

/// Everything the bridge resolves on the managed side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkContract {
    pub sdk_class: String,
    pub list_class: String,
    pub group_class: String,
    pub group_id_field: String,
    pub group_name_field: String,
    pub init_layout: InitLayout,
    pub methods: MethodNames,
}

impl Default for SdkContract {
    fn default() -> Self {
        SdkFlavor::default().contract()
    }
}

/// One resolvable member of the contract, for display and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractEntry {
    pub role: &'static str,
    pub kind: MemberKind,
    pub class: String,
    pub name: String,
    pub signature: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    StaticMethod,
    Method,
    Field,
}

impl SdkContract {
    /// Convert dotted class names (`java.util.List`) to JNI slash form.
    pub fn normalized(mut self) -> Self {
        for class in [
            &mut self.sdk_class,
            &mut self.list_class,
            &mut self.group_class,
        ] {
            *class = class.trim().replace('.', "/");
        }
        self
    }

    /// Reject empty class, method and field names.
    pub fn validate(&self) -> Result<(), BridgeError> {
        for entry in self.entries() {
            if entry.class.trim().is_empty() {
                return Err(BridgeError::InvalidConfig(format!(
                    "empty class name for {}",
                    entry.role
                )));
            }
            if entry.name.trim().is_empty() {
                return Err(BridgeError::InvalidConfig(format!(
                    "empty member name for {}",
                    entry.role
                )));
            }
        }
        Ok(())
    }

    /// All members the bridge will resolve, in resolution order.
    pub fn entries(&self) -> Vec<ContractEntry> {
        let sdk = |role, name: &str, signature| ContractEntry {
            role,
            kind: MemberKind::StaticMethod,
            class: self.sdk_class.clone(),
            name: name.to_string(),
            signature,
        };
        let methods = &self.methods;

        let mut entries = Vec::new();
        if let Some(name) = &methods.enable_debug {
            entries.push(sdk("enable_debug", name, signatures::ENABLE_DEBUG));
        }
        entries.push(sdk("init", &methods.init, self.init_layout.signature()));
        entries.push(sdk("start", &methods.start, signatures::START));
        entries.push(sdk("log_event", &methods.log_event, signatures::LOG_EVENT));
        entries.push(sdk(
            "user_groups",
            &methods.user_groups,
            signatures::USER_GROUPS,
        ));
        if let Some(name) = &methods.request_user_data {
            entries.push(sdk(
                "request_user_data",
                name,
                signatures::REQUEST_USER_DATA,
            ));
        }
        if let Some(name) = &methods.delete_user_data {
            entries.push(sdk(
                "delete_user_data",
                name,
                signatures::DELETE_USER_DATA,
            ));
        }
        if let Some(name) = &methods.uuid {
            entries.push(sdk("uuid", name, signatures::UUID));
        }

        for (role, name, signature) in [
            ("list_get", "get", signatures::LIST_GET),
            ("list_size", "size", signatures::LIST_SIZE),
        ] {
            entries.push(ContractEntry {
                role,
                kind: MemberKind::Method,
                class: self.list_class.clone(),
                name: name.to_string(),
                signature,
            });
        }

        for (role, name) in [
            ("group_id", &self.group_id_field),
            ("group_name", &self.group_name_field),
        ] {
            entries.push(ContractEntry {
                role,
                kind: MemberKind::Field,
                class: self.group_class.clone(),
                name: name.clone(),
                signature: signatures::STRING_FIELD,
            });
        }

        entries
    }
}

fn default_background_tasks() -> bool {
    true
}

/// Bridge configuration, loadable from JSON
///
/// ```json
/// { "flavor": "legacy", "background_tasks": false, "log_level": "debug" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Preset used when `contract` is not given
    #[serde(default)]
    pub flavor: SdkFlavor,
    /// Full contract override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<SdkContract>,
    /// Allow SDK jobs to keep running in the background
    #[serde(default = "default_background_tasks")]
    pub background_tasks: bool,
    /// Log level applied by `hqm_logging_init` when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flavor: SdkFlavor::default(),
            contract: None,
            background_tasks: default_background_tasks(),
            log_level: None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        self.contract().validate()?;
        self.level_filter()?;
        Ok(())
    }

    /// The contract the bridge binds against
    pub fn contract(&self) -> SdkContract {
        self.contract
            .clone()
            .unwrap_or_else(|| self.flavor.contract())
            .normalized()
    }

    pub fn level_filter(&self) -> Result<Option<LevelFilter>, BridgeError> {
        match &self.log_level {
            None => Ok(None),
            Some(level) => LevelFilter::from_str(level)
                .map(Some)
                .map_err(|_| BridgeError::InvalidConfig(format!("unknown log level '{level}'"))),
        }
    }
}
