use crate::core::frame::Frame;
use crate::error::constants::{ERR_REGISTRY_READ_LOCK, ERR_REGISTRY_WRITE_LOCK};
use crate::error::{ProtocolError, Result};
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::error;

/// Observer notified of every frame an engine sends or receives.
///
/// Hooks run synchronously: `on_receive` on the engine's receive thread,
/// `on_send` on whichever thread called `send_packet`. A slow hook stalls
/// further receives, so keep them short. Instances are shared, which is why
/// the hooks take `&self`; use interior mutability for state.
pub trait Plugin: Send + Sync {
    /// Called after a frame was handed to the OS in full.
    fn on_send(&self, frame: &Frame, peer: &SocketAddr);

    /// Called after an inbound datagram decoded into a frame.
    fn on_receive(&self, frame: &Frame, peer: &SocketAddr);

    /// Label used in log fields.
    fn name(&self) -> &str {
        "plugin"
    }
}

/// Ordered list of plugins with synchronous fan-out.
///
/// Cloning yields another handle to the same list. Each notification pass
/// iterates a snapshot taken under the read lock, so hooks run without the
/// lock held and may register or unregister plugins themselves.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<RwLock<Vec<Arc<dyn Plugin>>>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin. Registering the same instance twice notifies it twice.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let mut plugins = self
            .plugins
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_REGISTRY_WRITE_LOCK))?;

        plugins.push(plugin);
        Ok(())
    }

    /// Remove every registration of `plugin` (by identity). Returns whether any was removed.
    pub fn unregister(&self, plugin: &Arc<dyn Plugin>) -> Result<bool> {
        let mut plugins = self
            .plugins
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_REGISTRY_WRITE_LOCK))?;

        let before = plugins.len();
        plugins.retain(|p| !same_instance(p, plugin));
        Ok(plugins.len() != before)
    }

    pub fn clear(&self) -> Result<()> {
        self.plugins
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_REGISTRY_WRITE_LOCK))?
            .clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `on_send` on every plugin in registration order.
    ///
    /// Returns how many hooks panicked; those are logged and skipped.
    pub fn notify_send(&self, frame: &Frame, peer: &SocketAddr) -> Result<usize> {
        self.fan_out("on_send", |p| p.on_send(frame, peer))
    }

    /// Invoke `on_receive` on every plugin in registration order.
    ///
    /// Returns how many hooks panicked; those are logged and skipped.
    pub fn notify_receive(&self, frame: &Frame, peer: &SocketAddr) -> Result<usize> {
        self.fan_out("on_receive", |p| p.on_receive(frame, peer))
    }

    fn snapshot(&self) -> Result<Vec<Arc<dyn Plugin>>> {
        self.plugins
            .read()
            .map(|p| p.clone())
            .map_err(|_| ProtocolError::LockPoisoned(ERR_REGISTRY_READ_LOCK))
    }

    fn fan_out<F>(&self, hook: &'static str, call: F) -> Result<usize>
    where
        F: Fn(&dyn Plugin),
    {
        let mut panicked = 0;
        for plugin in self.snapshot()? {
            if catch_unwind(AssertUnwindSafe(|| call(plugin.as_ref()))).is_err() {
                error!(plugin = plugin.name(), hook, "Plugin panicked");
                panicked += 1;
            }
        }
        Ok(panicked)
    }
}

#[inline]
fn same_instance(a: &Arc<dyn Plugin>, b: &Arc<dyn Plugin>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
