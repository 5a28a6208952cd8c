// Mist Reveal Core - Rust blow detection engine
// Microphone metering turned into a blow-intensity signal that clears a fogged portrait

// Module declarations
pub mod api;
pub mod audio;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod reveal;
pub mod telemetry;

// Re-exports for convenience
pub use api::*;

#[cfg(target_os = "android")]
use log::info;

/// Install the Android logcat subscriber
///
/// `log` records from the library are forwarded through tracing's log bridge.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    match tracing_android::layer("MistReveal") {
        Ok(layer) => {
            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::EnvFilter::new("debug"))
                .with(layer)
                .try_init();
        }
        Err(err) => eprintln!("failed to open logcat writer: {}", err),
    }
}

/// Install a formatted stderr subscriber filtered by `RUST_LOG` (default `info`)
///
/// Stdout stays free for the CLI's JSON output.
///
/// Safe to call more than once; later calls are ignored.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android
/// This function initializes the Android context required by oboe-rs
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging();

    info!("JNI_OnLoad called - initializing Android context");

    // SAFETY: The JavaVM pointer is valid for the life of the process and
    // this runs before any Oboe stream is opened.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            std::ptr::null_mut(),
        );
    }
    engine::backend::mark_android_context_initialized();

    info!("Android context initialized successfully");

    jni::sys::JNI_VERSION_1_6
}
