use std::sync::atomic::{AtomicBool, Ordering};

use crate::dfa::DfaGenerator;

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_debug(enabled: bool) {
	DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_debug() -> bool {
	DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Logs the builder graph as JSON, only when debug mode is enabled.
pub fn dump(generator: &DfaGenerator) {
	if !is_debug() {
		return;
	}
	debug!("{:?} builder graph: {}", generator.direction(), generator.to_json());
}
