//! Input device resolution.
//!
//! Glue, deliberately outside the pipeline: the core takes an
//! already-resolved device and never performs lookup itself.

use color_eyre::eyre::{eyre, Result as EyreResult};
use cpal::traits::{DeviceTrait, HostTrait};

/// Resolve an input device by name substring, or the host default.
pub fn resolve_input(name_fragment: Option<&str>) -> EyreResult<cpal::Device> {
    let host = cpal::default_host();

    match name_fragment {
        None => host
            .default_input_device()
            .ok_or_else(|| eyre!("no default input device available")),
        Some(fragment) => {
            for device in host.input_devices()? {
                if device.name().is_ok_and(|name| name.contains(fragment)) {
                    return Ok(device);
                }
            }
            Err(eyre!("no input device matching {fragment:?}"))
        }
    }
}

pub fn list_input_devices() -> EyreResult<()> {
    let host = cpal::default_host();
    for device in host.input_devices()? {
        println!("{}", device.name()?);
    }
    Ok(())
}
