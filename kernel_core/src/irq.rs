//! User-level interrupt objects
//!
//! A `UserIrq` binds one controller line to one signal context. An
//! occurrence masks the line and submits a single signal; the handler
//! re-arms the line by acknowledging the interrupt object. Until then,
//! further occurrences on the line are dropped.
//!
//! Masking goes through the [`IrqController`] trait so tests can observe
//! the line operations without hardware.

use kernel_types::{IrqId, SignalContextId};

use crate::error::KernelError;
use crate::object::{IdentityId, KernelObject};
use crate::Kernel;

/// Interrupt-controller line operations
pub trait IrqController: Send {
    fn mask(&mut self, line: u32);
    fn unmask(&mut self, line: u32);
}

impl std::fmt::Debug for dyn IrqController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IrqController")
    }
}

/// A user-level interrupt object
#[derive(Debug)]
pub struct UserIrq {
    pub(crate) id: IrqId,
    pub(crate) identity: IdentityId,
    pub(crate) line: u32,
    pub(crate) context: SignalContextId,
    /// False between an occurrence and its acknowledgement
    pub(crate) enabled: bool,
}

impl UserIrq {
    pub fn id(&self) -> IrqId {
        self.id
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn context(&self) -> SignalContextId {
        self.context
    }
}

impl Kernel {
    /// Creates an interrupt object for a controller line
    ///
    /// A line can back at most one interrupt object. The line starts
    /// unmasked.
    pub fn create_irq(
        &mut self,
        line: u32,
        context: SignalContextId,
    ) -> Result<IrqId, KernelError> {
        if self.irq_lines.contains_key(&line) {
            return Err(KernelError::IrqLineBound(line));
        }
        if !self.contexts.contains_key(&context) {
            return Err(KernelError::ContextNotFound(context));
        }
        let id = IrqId::new();
        let identity = self.identities.create(KernelObject::Irq(id));
        self.irqs.insert(
            id,
            UserIrq {
                id,
                identity,
                line,
                context,
                enabled: true,
            },
        );
        self.irq_lines.insert(line, id);
        if let Some(controller) = self.irq_controller.as_mut() {
            controller.unmask(line);
        }
        Ok(id)
    }

    /// Reports an occurrence on a controller line
    ///
    /// Returns whether the occurrence was taken. A line without an enabled
    /// interrupt object drops the occurrence. Taking it masks the line and
    /// submits one signal to the bound context.
    pub fn irq_occurred(&mut self, line: u32) -> bool {
        let Some(&irq_id) = self.irq_lines.get(&line) else {
            return false;
        };
        let context = match self.irqs.get_mut(&irq_id) {
            Some(irq) if irq.enabled => {
                irq.enabled = false;
                irq.context
            }
            _ => return false,
        };
        if let Some(controller) = self.irq_controller.as_mut() {
            controller.mask(line);
        }
        // The context may have been destroyed under the interrupt object;
        // the occurrence is still consumed.
        let _ = self.submit_signal(context, 1);
        true
    }

    /// Acknowledges an interrupt object, re-arming its line
    pub fn ack_irq(&mut self, id: IrqId) -> Result<(), KernelError> {
        let line = {
            let irq = self.irqs.get_mut(&id).ok_or(KernelError::IrqNotFound(id))?;
            irq.enabled = true;
            irq.line
        };
        if let Some(controller) = self.irq_controller.as_mut() {
            controller.unmask(line);
        }
        Ok(())
    }

    /// Destroys an interrupt object, leaving its line masked
    pub fn destroy_irq(&mut self, id: IrqId) -> Result<(), KernelError> {
        let irq = self.irqs.remove(&id).ok_or(KernelError::IrqNotFound(id))?;
        self.irq_lines.remove(&irq.line);
        if let Some(controller) = self.irq_controller.as_mut() {
            controller.mask(irq.line);
        }
        self.invalidate_identity(irq.identity);
        Ok(())
    }

    /// Returns the identity handle of an interrupt object
    pub fn irq_identity(&self, id: IrqId) -> Option<IdentityId> {
        self.irqs.get(&id).map(|irq| irq.identity)
    }

    /// Returns whether an interrupt object is armed
    pub fn irq_enabled(&self, id: IrqId) -> Option<bool> {
        self.irqs.get(&id).map(|irq| irq.enabled)
    }
}
