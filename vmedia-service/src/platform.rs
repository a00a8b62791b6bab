// SPDX-License-Identifier: GPL-3.0-only

//! Fixed adapter routing for the system operations
//!
//! Built once at startup; the state machine only ever sees the trait
//! objects, which is also how the tests substitute doubles.

use std::sync::Arc;

use vmedia_sys::{GadgetOps, ProcessOps, ShareOps, SmbShare, Supervisor, UsbGadget};

/// Bundle of the system adapters shared by every slot.
#[derive(Clone)]
pub struct Platform {
    process: Arc<dyn ProcessOps>,
    gadget: Arc<dyn GadgetOps>,
    share: Arc<dyn ShareOps>,
}

impl Platform {
    pub fn new(
        process: Arc<dyn ProcessOps>,
        gadget: Arc<dyn GadgetOps>,
        share: Arc<dyn ShareOps>,
    ) -> Self {
        Self {
            process,
            gadget,
            share,
        }
    }

    /// The real thing: supervisor, configfs gadget, CIFS mounts.
    pub fn system() -> Self {
        Self::new(
            Arc::new(Supervisor::new()),
            Arc::new(UsbGadget::new()),
            Arc::new(SmbShare::new()),
        )
    }

    pub fn process(&self) -> &dyn ProcessOps {
        self.process.as_ref()
    }

    pub fn gadget(&self) -> &dyn GadgetOps {
        self.gadget.as_ref()
    }

    pub fn share(&self) -> &dyn ShareOps {
        self.share.as_ref()
    }
}
