//! Global panic hook
//!
//! Logs panic location and message through `tracing` before anything else
//! happens. Panics on worker threads (strategy evaluation, log drainer) are
//! contained by their owners, so the hook only terminates the process when
//! the main thread panics.
//!
//! ```no_run
//! use tachyon_core::resilience::install_panic_handler;
//!
//! fn main() {
//!     install_panic_handler();
//!     // ... rest of application
//! }
//! ```

use std::panic;
use std::process;
use tracing::error;

/// Render a panic payload as text
pub fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}

/// Install the process-wide panic hook
pub fn install_panic_handler() {
    // Store the default panic hook for delegation
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown location>".to_string());

        let message = payload_message(panic_info.payload());

        let current = std::thread::current();
        let thread = current.name().unwrap_or("<unnamed>");

        error!(
            location = %location,
            message = %message,
            thread = %thread,
            "PANIC"
        );

        if thread != "main" {
            return;
        }

        eprintln!("FATAL PANIC on main thread");
        eprintln!("Location: {}", location);
        eprintln!("Message:  {}", message);

        // Prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);

        // Give tracing time to flush logs
        std::thread::sleep(std::time::Duration::from_millis(100));
        process::exit(1);
    }));

    tracing::info!("Panic handler installed");
}
