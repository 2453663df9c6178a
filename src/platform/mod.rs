//! ESP-IDF adapters for the radio and network collaborators.
//!
//! Everything here translates vendor types into the crate's own traits and
//! events; no pipeline logic lives in this module.

pub mod ble;
pub mod mqtt;
pub mod wifi;

use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_svc::sys::EspError;

use crate::config::TaskConfig;

/// Spawn a pipeline task with its FreeRTOS priority and stack size.
pub fn spawn_task<F>(task: &TaskConfig, body: F) -> anyhow::Result<std::thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    ThreadSpawnConfiguration {
        stack_size: task.stack_size,
        priority: task.priority,
        ..Default::default()
    }
    .set()?;

    let handle = std::thread::Builder::new()
        .name(task.name.into())
        .stack_size(task.stack_size)
        .spawn(body)?;

    reset_spawn_configuration()?;
    log::info!("task '{}' started (prio {}, stack {})", task.name, task.priority, task.stack_size);
    Ok(handle)
}

fn reset_spawn_configuration() -> Result<(), EspError> {
    ThreadSpawnConfiguration::default().set()
}
