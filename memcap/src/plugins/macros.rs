/*!
Export macros for plugin libraries.

Both macros emit a `#[no_mangle]` descriptor static together with the `extern "C"` thunks it
points to. The create function receives the parsed arguments, the optional input bundle and the
library context the new instance has to carry.

```ignore
fn create(
    args: &Args,
    _os: Option<OsInstance>,
    lib: COptArc<c_void>,
) -> Result<ConnectorInstance> {
    let mem = DummyMemory::new(size::mb(16));
    Ok(ConnectorInstance::builder(mem).with_context(lib).build())
}

connector_plugin! {
    export: MEMCAP_CONNECTOR_DUMMY,
    name: "dummy",
    description: "in-memory test connector",
    create: create,
}
```
*/

/// Declares a connector plugin descriptor.
///
/// `help` is a `fn() -> String`, `target_list` a `fn() -> Result<Vec<TargetInfo>>`. Both are
/// optional.
#[macro_export]
macro_rules! connector_plugin {
    (
        export: $export:ident,
        name: $name:expr,
        description: $description:expr,
        create: $create:path
        $(, help: $help:path)?
        $(, target_list: $targets:path)?
        $(,)?
    ) => {
        $crate::__plugin_descriptor!(
            $export,
            $crate::plugins::ConnectorDescriptor,
            $crate::plugins::OsInstance,
            $crate::plugins::ConnectorInstance,
            $name,
            $description,
            $create,
            [$($help)?],
            [$($targets)?]
        );
    };
}

/// Declares an os plugin descriptor.
///
/// Accepts the same keys as [`connector_plugin!`](crate::connector_plugin).
#[macro_export]
macro_rules! os_plugin {
    (
        export: $export:ident,
        name: $name:expr,
        description: $description:expr,
        create: $create:path
        $(, help: $help:path)?
        $(, target_list: $targets:path)?
        $(,)?
    ) => {
        $crate::__plugin_descriptor!(
            $export,
            $crate::plugins::OsDescriptor,
            $crate::plugins::ConnectorInstance,
            $crate::plugins::OsInstance,
            $name,
            $description,
            $create,
            [$($help)?],
            [$($targets)?]
        );
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __plugin_descriptor {
    (
        $export:ident,
        $descriptor:ty,
        $input:ty,
        $instance:ty,
        $name:expr,
        $description:expr,
        $create:path,
        [$($help:path)?],
        [$($targets:path)?]
    ) => {
        #[no_mangle]
        pub static $export: $descriptor = {
            extern "C" fn create_thunk(
                args: Option<&$crate::types::ReprCString>,
                input: $crate::types::COption<$input>,
                lib: $crate::types::COptArc<::core::ffi::c_void>,
                logger: Option<&'static $crate::plugins::PluginLogger>,
                out: &mut ::core::mem::MaybeUninit<$instance>,
                err: $crate::plugins::ErrorCallback,
            ) -> i32 {
                $crate::plugins::create_bundle(args, logger, out, err, |args| {
                    $create(args, input.into(), lib)
                })
            }

            $crate::plugins::PluginDescriptor {
                plugin_version: $crate::plugins::MEMCAP_PLUGIN_VERSION,
                input_layout: $crate::plugins::TypeLayout::of::<$crate::types::COption<$input>>(),
                output_layout: $crate::plugins::TypeLayout::of::<$instance>(),
                name: $crate::types::CSliceRef::from_static_str($name),
                version: $crate::types::CSliceRef::from_static_str(env!("CARGO_PKG_VERSION")),
                description: $crate::types::CSliceRef::from_static_str($description),
                help_callback: $crate::__plugin_help!($($help)?),
                target_list_callback: $crate::__plugin_target_list!($($targets)?),
                create: create_thunk,
            }
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __plugin_help {
    () => {
        None
    };
    ($help:path) => {{
        extern "C" fn help_thunk(mut callback: $crate::plugins::HelpCallback) {
            let help: String = $help();
            callback.call(help.into());
        }
        Some(help_thunk as extern "C" fn($crate::plugins::HelpCallback))
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __plugin_target_list {
    () => {
        None
    };
    ($targets:path) => {{
        extern "C" fn target_list_thunk(mut callback: $crate::plugins::TargetCallback) -> i32 {
            use $crate::error::AsIntResult;
            $targets()
                .map(|targets| {
                    callback.feed(targets);
                })
                .into_int_result()
        }
        Some(target_list_thunk as extern "C" fn($crate::plugins::TargetCallback) -> i32)
    }};
}
