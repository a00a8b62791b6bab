// SPDX-License-Identifier: GPL-3.0-only

//! USB mass-storage gadget configuration through configfs
//!
//! One gadget directory per slot. Configuration builds the tree, points the
//! single LUN at the slot's NBD device node and binds the first available
//! UDC; removal unbinds and tears the tree down in reverse order. Sysfs
//! attributes are written with a single write() syscall each, the kernel
//! processes the value on the first write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use vmedia_types::NbdDevice;

use crate::error::{Result, SysError};

const CONFIGFS_ROOT: &str = "/sys/kernel/config/usb_gadget";
const UDC_ROOT: &str = "/sys/class/udc";

/// Linux Foundation vendor id.
const USB_VENDOR_ID: &str = "0x1d6b";
/// Multifunction composite gadget product id.
const USB_PRODUCT_ID: &str = "0x0104";

/// USB gadget and hotplug-workaround operations.
///
/// The gadget is a process-wide resource addressed by slot name; callers
/// serialize access per slot through the state machine.
pub trait GadgetOps: Send + Sync {
    /// Publish `device` to the host as USB mass storage for `slot`.
    fn configure(&self, slot: &str, device: &NbdDevice, rw: bool) -> Result<()>;

    /// Remove the gadget previously configured for `slot`.
    fn remove(&self, slot: &str) -> Result<()>;

    /// Poke a `change` uevent for `device` so an already-present device node
    /// still yields an insertion event after registration. Failures are
    /// logged, never propagated.
    fn trigger_udev_change(&self, device: &NbdDevice);
}

/// Real configfs-backed gadget driver.
pub struct UsbGadget {
    configfs_root: PathBuf,
    udc_root: PathBuf,
}

impl UsbGadget {
    pub fn new() -> Self {
        Self {
            configfs_root: PathBuf::from(CONFIGFS_ROOT),
            udc_root: PathBuf::from(UDC_ROOT),
        }
    }

    /// Gadget rooted elsewhere; used by tests.
    pub fn with_roots(configfs_root: impl Into<PathBuf>, udc_root: impl Into<PathBuf>) -> Self {
        Self {
            configfs_root: configfs_root.into(),
            udc_root: udc_root.into(),
        }
    }

    fn gadget_dir(&self, slot: &str) -> PathBuf {
        self.configfs_root.join(format!("mass-storage-{slot}"))
    }

    fn first_udc(&self) -> Result<String> {
        let mut entries: Vec<_> = fs::read_dir(&self.udc_root)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries
            .into_iter()
            .next()
            .ok_or_else(|| SysError::Gadget("no USB device controller available".to_string()))
    }
}

impl Default for UsbGadget {
    fn default() -> Self {
        Self::new()
    }
}

impl GadgetOps for UsbGadget {
    fn configure(&self, slot: &str, device: &NbdDevice, rw: bool) -> Result<()> {
        let gadget = self.gadget_dir(slot);
        let strings = gadget.join("strings/0x409");
        let config = gadget.join("configs/c.1");
        let config_strings = config.join("strings/0x409");
        let function = gadget.join("functions/mass_storage.usb0");
        let lun = function.join("lun.0");

        let result = (|| -> Result<()> {
            fs::create_dir_all(&strings)?;
            write_attr(&gadget.join("idVendor"), USB_VENDOR_ID)?;
            write_attr(&gadget.join("idProduct"), USB_PRODUCT_ID)?;
            write_attr(&strings.join("manufacturer"), "OpenBMC")?;
            write_attr(&strings.join("product"), &format!("Virtual Media {slot}"))?;

            fs::create_dir_all(&config_strings)?;
            write_attr(&config_strings.join("configuration"), "config 1")?;

            // configfs creates lun.0 with the function directory, but a
            // plain filesystem (tests) does not.
            fs::create_dir_all(&lun)?;
            write_attr(&lun.join("removable"), "1")?;
            write_attr(&lun.join("ro"), if rw { "0" } else { "1" })?;
            write_attr(&lun.join("file"), &device.path().display().to_string())?;

            let link = config.join("mass_storage.usb0");
            if !link.exists() {
                std::os::unix::fs::symlink(&function, &link)?;
            }

            write_attr(&gadget.join("UDC"), &self.first_udc()?)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                tracing::info!(slot, device = %device, rw, "USB gadget configured");
                Ok(())
            }
            Err(e) => {
                tracing::error!(slot, device = %device, error = %e, "USB gadget configuration failed");
                // Leave no half-built gadget behind.
                let _ = self.remove(slot);
                Err(e)
            }
        }
    }

    fn remove(&self, slot: &str) -> Result<()> {
        let gadget = self.gadget_dir(slot);
        if !gadget.exists() {
            return Ok(());
        }

        // Unbind first; removal order is the reverse of creation.
        let _ = write_attr(&gadget.join("UDC"), "");
        let _ = fs::remove_file(gadget.join("configs/c.1/mass_storage.usb0"));
        let steps = [
            "configs/c.1/strings/0x409",
            "configs/c.1",
            "functions/mass_storage.usb0",
            "strings/0x409",
        ];
        for step in steps {
            let path = gadget.join(step);
            if path.exists() {
                remove_tree(&path)?;
            }
        }
        remove_tree(&gadget)?;
        tracing::info!(slot, "USB gadget removed");
        Ok(())
    }

    fn trigger_udev_change(&self, device: &NbdDevice) {
        let path = device.uevent_path();
        if let Err(e) = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .and_then(|mut f| f.write_all(b"change\n"))
        {
            tracing::debug!(device = %device, error = %e, "uevent change trigger skipped");
        }
    }
}

/// rmdir, falling back to recursive removal for plain filesystems where
/// attribute files survive as regular files.
fn remove_tree(path: &Path) -> Result<()> {
    if fs::remove_dir(path).is_ok() {
        return Ok(());
    }
    fs::remove_dir_all(path).map_err(|e| SysError::Gadget(format!("{}: {e}", path.display())))
}

/// Single-syscall sysfs attribute write with trailing newline.
fn write_attr(path: &Path, content: &str) -> Result<()> {
    let mut buf = content.as_bytes().to_vec();
    if !content.ends_with('\n') {
        buf.push(b'\n');
    }
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| SysError::Gadget(format!("open {}: {e}", path.display())))?;
    file.write_all(&buf)
        .map_err(|e| SysError::Gadget(format!("write {}: {e}", path.display())))?;
    Ok(())
}
