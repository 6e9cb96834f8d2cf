//! JNI implementation of the SDK capability set
//!
//! [`SdkBindings`] resolves every class, method and field named by the
//! [`SdkContract`] once, when the bridge is attached. Lookup failures surface
//! there as structured errors instead of on first use. [`JniSdk`] then invokes
//! the cached ids; each call runs inside a JNI local frame so every local
//! reference it creates is released before returning.

use jni::objects::{
    GlobalRef, JClass, JFieldID, JMethodID, JObject, JStaticMethodID, JString, JValue,
};
use jni::signature::{Primitive, ReturnType};
use jni::sys::{jvalue, JNI_FALSE, JNI_TRUE};
use jni::{JNIEnv, JavaVM};
use log::{debug, info, warn};

use crate::config::{signatures, InitLayout, SdkContract};
use crate::error::BridgeError;
use crate::sdk::HqSdk;
use crate::types::ManagedGroup;

/// Local reference capacity reserved for one bridged call
const LOCAL_FRAME_CAPACITY: i32 = 16;

/// Java VM and hosting activity, passed explicitly to the bridge
pub struct HostContext {
    vm: JavaVM,
    activity: GlobalRef,
}

impl HostContext {
    pub fn new(vm: JavaVM, activity: GlobalRef) -> Self {
        Self { vm, activity }
    }

    /// Build a context from raw JNI pointers.
    ///
    /// # Safety
    /// - `vm` must be a valid `JavaVM` pointer.
    /// - `activity` must be a live reference to an `android.content.Context`
    ///   usable from the current thread. It is not released; a global
    ///   reference is taken instead.
    pub unsafe fn from_raw(
        vm: *mut jni::sys::JavaVM,
        activity: jni::sys::jobject,
    ) -> Result<Self, BridgeError> {
        if vm.is_null() {
            return Err(BridgeError::InvalidArgument("null JavaVM pointer".to_string()));
        }
        if activity.is_null() {
            return Err(BridgeError::InvalidArgument("null activity reference".to_string()));
        }

        let vm = JavaVM::from_raw(vm)?;
        let activity = {
            let env = vm.attach_current_thread()?;
            let local = JObject::from_raw(activity);
            env.new_global_ref(&local)?
        };

        Ok(Self { vm, activity })
    }
}

/// SDL2 exposes the JNI environment and activity of its Android host.
#[cfg(all(target_os = "android", feature = "sdl"))]
pub mod sdl {
    use std::ffi::c_void;

    use jni::objects::JObject;
    use jni::JNIEnv;

    use super::HostContext;
    use crate::error::BridgeError;

    extern "C" {
        fn SDL_AndroidGetJNIEnv() -> *mut c_void;
        fn SDL_AndroidGetActivity() -> *mut c_void;
    }

    /// Host context of the running SDL activity
    pub fn host_context() -> Result<HostContext, BridgeError> {
        let raw_env = unsafe { SDL_AndroidGetJNIEnv() } as *mut jni::sys::JNIEnv;
        if raw_env.is_null() {
            return Err(BridgeError::NotAttached);
        }
        let env = unsafe { JNIEnv::from_raw(raw_env) }?;

        let raw_activity = unsafe { SDL_AndroidGetActivity() } as jni::sys::jobject;
        if raw_activity.is_null() {
            return Err(BridgeError::NotAttached);
        }
        let activity = unsafe { JObject::from_raw(raw_activity) };

        // SDL hands out a local reference
        let global = env.new_global_ref(&activity);
        env.delete_local_ref(activity)?;

        Ok(HostContext::new(env.get_java_vm()?, global?))
    }
}

/// Clear an exception left pending by a failed lookup.
fn clear_pending(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
}

/// Find a class, falling back to the activity's class loader.
///
/// `FindClass` on a natively attached thread only sees system classes, so app
/// classes such as the SDK need the loader that loaded the activity.
fn load_class<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject,
    name: &str,
) -> Result<JClass<'local>, BridgeError> {
    match env.find_class(name) {
        Ok(class) => return Ok(class),
        Err(jni::errors::Error::JavaException) => clear_pending(env),
        Err(e) => return Err(e.into()),
    }

    debug!("FindClass missed {name}, trying the activity class loader");
    let loader = env
        .call_method(activity, "getClassLoader", signatures::GET_CLASS_LOADER, &[])?
        .l()?;
    let binary_name = env.new_string(name.replace('/', "."))?;
    let loaded = env.call_method(
        &loader,
        "loadClass",
        signatures::LOAD_CLASS,
        &[JValue::from(&binary_name)],
    );

    match loaded {
        Ok(value) => {
            let class = value.l()?;
            if class.is_null() {
                return Err(BridgeError::ClassNotFound(name.to_string()));
            }
            Ok(JClass::from(class))
        }
        Err(jni::errors::Error::JavaException) => {
            clear_pending(env);
            Err(BridgeError::ClassNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn static_method_id(
    env: &mut JNIEnv,
    class: &JClass,
    class_name: &str,
    name: &str,
    signature: &str,
) -> Result<JStaticMethodID, BridgeError> {
    env.get_static_method_id(class, name, signature)
        .map_err(|_| {
            clear_pending(env);
            BridgeError::MethodNotFound {
                class: class_name.to_string(),
                name: name.to_string(),
                signature: signature.to_string(),
            }
        })
}

fn optional_static_method_id(
    env: &mut JNIEnv,
    class: &JClass,
    class_name: &str,
    name: Option<&str>,
    signature: &str,
) -> Result<Option<JStaticMethodID>, BridgeError> {
    name.map(|name| static_method_id(env, class, class_name, name, signature))
        .transpose()
}

fn method_id(
    env: &mut JNIEnv,
    class: &JClass,
    class_name: &str,
    name: &str,
    signature: &str,
) -> Result<JMethodID, BridgeError> {
    env.get_method_id(class, name, signature).map_err(|_| {
        clear_pending(env);
        BridgeError::MethodNotFound {
            class: class_name.to_string(),
            name: name.to_string(),
            signature: signature.to_string(),
        }
    })
}

fn field_id(
    env: &mut JNIEnv,
    class: &JClass,
    class_name: &str,
    name: &str,
) -> Result<JFieldID, BridgeError> {
    env.get_field_id(class, name, signatures::STRING_FIELD)
        .map_err(|_| {
            clear_pending(env);
            BridgeError::FieldNotFound {
                class: class_name.to_string(),
                name: name.to_string(),
                signature: signatures::STRING_FIELD.to_string(),
            }
        })
}

fn jboolean(value: bool) -> jvalue {
    JValue::Bool(if value { JNI_TRUE } else { JNI_FALSE }).as_jni()
}

/// Resolved handles for every member of an [`SdkContract`]
pub struct SdkBindings {
    sdk_class: GlobalRef,
    // Held so the cached ids stay valid
    _list_class: GlobalRef,
    _group_class: GlobalRef,
    init_layout: InitLayout,
    enable_debug: Option<JStaticMethodID>,
    init: JStaticMethodID,
    start: JStaticMethodID,
    log_event: JStaticMethodID,
    user_groups: JStaticMethodID,
    request_user_data: Option<JStaticMethodID>,
    delete_user_data: Option<JStaticMethodID>,
    uuid: Option<JStaticMethodID>,
    list_get: JMethodID,
    list_size: JMethodID,
    group_id: JFieldID,
    group_name: JFieldID,
}

impl SdkBindings {
    /// Resolve all classes, methods and fields of `contract`.
    pub fn resolve(
        env: &mut JNIEnv,
        activity: &JObject,
        contract: &SdkContract,
    ) -> Result<Self, BridgeError> {
        env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| {
            let sdk_class = load_class(env, activity, &contract.sdk_class)?;
            let list_class = load_class(env, activity, &contract.list_class)?;
            let group_class = load_class(env, activity, &contract.group_class)?;

            let sdk_name = contract.sdk_class.as_str();
            let methods = &contract.methods;

            let enable_debug = optional_static_method_id(
                env,
                &sdk_class,
                sdk_name,
                methods.enable_debug.as_deref(),
                signatures::ENABLE_DEBUG,
            )?;
            let request_user_data = optional_static_method_id(
                env,
                &sdk_class,
                sdk_name,
                methods.request_user_data.as_deref(),
                signatures::REQUEST_USER_DATA,
            )?;
            let delete_user_data = optional_static_method_id(
                env,
                &sdk_class,
                sdk_name,
                methods.delete_user_data.as_deref(),
                signatures::DELETE_USER_DATA,
            )?;
            let uuid = optional_static_method_id(
                env,
                &sdk_class,
                sdk_name,
                methods.uuid.as_deref(),
                signatures::UUID,
            )?;

            let bindings = SdkBindings {
                init: static_method_id(
                    env,
                    &sdk_class,
                    sdk_name,
                    &methods.init,
                    contract.init_layout.signature(),
                )?,
                start: static_method_id(
                    env,
                    &sdk_class,
                    sdk_name,
                    &methods.start,
                    signatures::START,
                )?,
                log_event: static_method_id(
                    env,
                    &sdk_class,
                    sdk_name,
                    &methods.log_event,
                    signatures::LOG_EVENT,
                )?,
                user_groups: static_method_id(
                    env,
                    &sdk_class,
                    sdk_name,
                    &methods.user_groups,
                    signatures::USER_GROUPS,
                )?,
                list_get: method_id(
                    env,
                    &list_class,
                    &contract.list_class,
                    "get",
                    signatures::LIST_GET,
                )?,
                list_size: method_id(
                    env,
                    &list_class,
                    &contract.list_class,
                    "size",
                    signatures::LIST_SIZE,
                )?,
                group_id: field_id(
                    env,
                    &group_class,
                    &contract.group_class,
                    &contract.group_id_field,
                )?,
                group_name: field_id(
                    env,
                    &group_class,
                    &contract.group_class,
                    &contract.group_name_field,
                )?,
                init_layout: contract.init_layout,
                enable_debug,
                request_user_data,
                delete_user_data,
                uuid,
                sdk_class: env.new_global_ref(&sdk_class)?,
                _list_class: env.new_global_ref(&list_class)?,
                _group_class: env.new_global_ref(&group_class)?,
            };
            Ok(bindings)
        })
    }

    fn call_static_void(
        &self,
        env: &mut JNIEnv,
        method: JStaticMethodID,
        args: &[jvalue],
    ) -> Result<(), BridgeError> {
        // SAFETY: `sdk_class` is kept alive by its global reference and `method`
        // was resolved on it with the signature `args` are built for.
        unsafe {
            let class = JClass::from_raw(self.sdk_class.as_obj().as_raw());
            env.call_static_method_unchecked(
                &class,
                method,
                ReturnType::Primitive(Primitive::Void),
                args,
            )?
            .v()?;
        }
        Ok(())
    }

    fn call_static_object<'local>(
        &self,
        env: &mut JNIEnv<'local>,
        method: JStaticMethodID,
    ) -> Result<JObject<'local>, BridgeError> {
        // SAFETY: as in `call_static_void`; object-returning methods take no arguments.
        let value = unsafe {
            let class = JClass::from_raw(self.sdk_class.as_obj().as_raw());
            env.call_static_method_unchecked(&class, method, ReturnType::Object, &[])?
        };
        Ok(value.l()?)
    }

    fn read_string<'local>(
        env: &mut JNIEnv<'local>,
        value: JObject<'local>,
    ) -> Result<Option<String>, BridgeError> {
        if value.is_null() {
            return Ok(None);
        }
        let value = env.auto_local(JString::from(value));
        let text: String = env.get_string(&value)?.into();
        Ok(Some(text))
    }

    fn read_group(&self, env: &mut JNIEnv, item: &JObject) -> Result<ManagedGroup, BridgeError> {
        let id = env
            .get_field_unchecked(item, self.group_id, ReturnType::Object)?
            .l()?;
        let id = Self::read_string(env, id)?;
        let name = env
            .get_field_unchecked(item, self.group_name, ReturnType::Object)?
            .l()?;
        let name = Self::read_string(env, name)?;
        Ok(ManagedGroup { id, name })
    }

    /// Unroll the managed group list element by element.
    fn read_groups(
        &self,
        env: &mut JNIEnv,
    ) -> Result<Option<Vec<Option<ManagedGroup>>>, BridgeError> {
        let list = self.call_static_object(env, self.user_groups)?;
        if list.is_null() {
            return Ok(None);
        }
        let list = env.auto_local(list);

        // SAFETY: `list_size` and `list_get` were resolved on the list interface.
        let size = unsafe {
            env.call_method_unchecked(
                &*list,
                self.list_size,
                ReturnType::Primitive(Primitive::Int),
                &[],
            )?
        }
        .i()?;

        let mut groups = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        for index in 0..size {
            let item = unsafe {
                env.call_method_unchecked(
                    &*list,
                    self.list_get,
                    ReturnType::Object,
                    &[JValue::Int(index).as_jni()],
                )?
            }
            .l()?;

            if item.is_null() {
                groups.push(None);
                continue;
            }
            let item = env.auto_local(item);
            groups.push(Some(self.read_group(env, &item)?));
        }

        Ok(Some(groups))
    }
}

/// [`HqSdk`] backed by the managed `HQSdk` class
pub struct JniSdk {
    host: HostContext,
    bindings: SdkBindings,
}

impl JniSdk {
    /// Resolve `contract` against the VM in `host`.
    pub fn bind(host: HostContext, contract: &SdkContract) -> Result<Self, BridgeError> {
        let bindings = {
            let mut env = host.vm.attach_current_thread()?;
            let result = SdkBindings::resolve(&mut env, host.activity.as_obj(), contract);
            clear_pending(&mut env);
            result?
        };
        info!("bound to {}", contract.sdk_class);
        Ok(Self { host, bindings })
    }

    /// Run one bridged operation on the current thread.
    fn call<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut JNIEnv, &SdkBindings, &JObject) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        let mut env = self.host.vm.attach_current_thread()?;
        let activity = self.host.activity.as_obj();
        let result = env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| {
            f(env, &self.bindings, activity)
        });

        if env.exception_check()? {
            let _ = env.exception_describe();
            env.exception_clear()?;
            warn!("managed exception during {operation}");
            return Err(BridgeError::ManagedException(operation));
        }
        result
    }
}

impl HqSdk for JniSdk {
    fn enable_debug(&self, enabled: bool) -> Result<(), BridgeError> {
        let method = self
            .bindings
            .enable_debug
            .ok_or(BridgeError::Unsupported("enable_debug"))?;
        self.call("enable_debug", |env, b, _| {
            b.call_static_void(env, method, &[jboolean(enabled)])
        })
    }

    fn init(&self, key: &str, debug: bool, background_tasks: bool) -> Result<(), BridgeError> {
        self.call("init", |env, b, activity| {
            let key = env.new_string(key)?;
            let context = JValue::from(activity).as_jni();
            let key = JValue::from(&key).as_jni();
            match b.init_layout {
                InitLayout::KeyDebug => {
                    b.call_static_void(env, b.init, &[context, key, jboolean(debug)])
                }
                InitLayout::KeyBackgroundDebug => b.call_static_void(
                    env,
                    b.init,
                    &[context, key, jboolean(!background_tasks), jboolean(debug)],
                ),
            }
        })
    }

    fn start(&self) -> Result<(), BridgeError> {
        self.call("start", |env, b, activity| {
            b.call_static_void(env, b.start, &[JValue::from(activity).as_jni()])
        })
    }

    fn log_event(&self, name: &str, data: &str) -> Result<(), BridgeError> {
        self.call("log_event", |env, b, _| {
            let name = env.new_string(name)?;
            let data = env.new_string(data)?;
            b.call_static_void(
                env,
                b.log_event,
                &[JValue::from(&name).as_jni(), JValue::from(&data).as_jni()],
            )
        })
    }

    fn user_groups(&self) -> Result<Option<Vec<Option<ManagedGroup>>>, BridgeError> {
        self.call("user_groups", |env, b, _| b.read_groups(env))
    }

    fn request_user_data(&self, email: &str) -> Result<(), BridgeError> {
        let method = self
            .bindings
            .request_user_data
            .ok_or(BridgeError::Unsupported("request_user_data"))?;
        self.call("request_user_data", |env, b, _| {
            let email = env.new_string(email)?;
            b.call_static_void(env, method, &[JValue::from(&email).as_jni()])
        })
    }

    fn delete_user_data(&self) -> Result<(), BridgeError> {
        let method = self
            .bindings
            .delete_user_data
            .ok_or(BridgeError::Unsupported("delete_user_data"))?;
        self.call("delete_user_data", |env, b, _| {
            b.call_static_void(env, method, &[])
        })
    }

    fn uuid(&self) -> Result<Option<String>, BridgeError> {
        let method = self.bindings.uuid.ok_or(BridgeError::Unsupported("uuid"))?;
        self.call("uuid", |env, b, _| {
            let value = b.call_static_object(env, method)?;
            SdkBindings::read_string(env, value)
        })
    }

    fn supports_debug_toggle(&self) -> bool {
        self.bindings.enable_debug.is_some()
    }
}
