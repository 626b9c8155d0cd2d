//=====================================================
// File: logging.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing setup for CauseLang embedders
// Objective: Install a subscriber scoped to the causelang targets, with
//            instruction tracing driven by the VM options
//=====================================================

use crate::config::VmOptions;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

/// Environment variable that overrides the default filter directives.
pub const LOG_ENV: &str = "CAUSELANG_LOG";

static INIT: OnceLock<()> = OnceLock::new();

/// Directives used when `CAUSELANG_LOG` is unset: crate events at info, and
/// VM dispatch at trace when the options ask for instruction tracing.
pub fn default_filter(options: &VmOptions) -> EnvFilter {
    let mut directives = String::from("causelang=info");
    if options.trace_instructions {
        directives.push_str(",causelang::vm=trace");
    }
    EnvFilter::new(directives)
}

fn filter_for(options: &VmOptions) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => default_filter(options),
    }
}

/// Initialize tracing for `component` with default options.
pub fn init(component: &str) {
    init_with(component, &VmOptions::default());
}

/// Only the first call in a process installs a subscriber; later calls just log.
pub fn init_with(component: &str, options: &VmOptions) {
    INIT.get_or_init(|| {
        // The host may already own the global subscriber.
        let _ = SubscriberBuilder::default()
            .with_env_filter(filter_for(options))
            .with_target(true)
            .compact()
            .try_init();
    });
    tracing::info!(
        target: "causelang",
        component,
        trace_instructions = options.trace_instructions,
        "tracing initialised"
    );
}
