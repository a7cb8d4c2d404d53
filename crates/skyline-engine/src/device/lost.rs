use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised from the device-lost callback, read by the render thread.
///
/// wgpu may invoke the callback on any thread, so the flag is shared through an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct DeviceLossFlag(Arc<AtomicBool>);

impl DeviceLossFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_a_clone_is_seen_by_the_owner() {
        let flag = DeviceLossFlag::default();
        assert!(!flag.is_raised());

        let callback_side = flag.clone();
        std::thread::spawn(move || callback_side.raise()).join().unwrap();

        assert!(flag.is_raised());
    }
}
