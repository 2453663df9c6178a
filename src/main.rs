//! Hexagon Watch - firmware entry point
//!
//! Boot order:
//! 1. ESP-IDF patches and logger
//! 2. Log drain task (everything after this logs through the streams)
//! 3. BLE attribute server (registration continues in radio callbacks)
//! 4. Wi-Fi station, then the MQTT client, its event loop and the
//!    subscriber task
//! 5. Producer, Publisher, broadcast refresher, health monitor
//!
//! On the host the binary runs a short loopback of the pipeline instead.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::prelude::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use parking_lot::Mutex;

    use hexagon_watch::attribute::AttributeRegistry;
    use hexagon_watch::platform::{self, ble, mqtt, wifi};
    use hexagon_watch::producer::RandomBpm;
    use hexagon_watch::session::SessionSink;
    use hexagon_watch::{log_drain, Pipeline, CONFIG};

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("{}", env!("VERSION_STRING"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let (wifi_modem, bt_modem) = peripherals.modem.split();

    let config = &CONFIG;
    let pipeline = Pipeline::new(&config.pipeline);

    platform::spawn_task(&config.log_task, || log_drain::log_drain_task())?;

    // BLE: the server advances through registration in the GATTS callbacks
    let driver = Arc::new(ble::BleDriver::new(bt_modem, Some(nvs.clone()))?);
    let registry = Arc::new(Mutex::new(AttributeRegistry::new(&config.radio)));
    let radio = Arc::new(ble::EspRadio::new(
        driver,
        [config.radio.control_uuid, config.radio.auxiliary_uuid, config.radio.broadcast_uuid],
    )?);
    let server = pipeline.attribute_server(radio.clone(), registry.clone(), config.radio);
    ble::start(radio.clone(), server, config.radio.app_id)?;
    info!("ble: '{}' registering", config.radio.device_name);

    // Network
    let _wifi = wifi::connect(wifi_modem, sys_loop, nvs, &config.network)?;
    let (session, events) = mqtt::connect(&config.network, pipeline.inbound(config.network.topic))?;
    platform::spawn_task(&config.mqtt_task, move || events.run())?;

    let subscriber = session.clone();
    let retry = config.network.resubscribe_delay;
    platform::spawn_task(&config.subscriber_task, move || subscriber.run_subscriber(retry))?;

    // Pipeline tasks
    let producer = pipeline.producer(RandomBpm::from_entropy());
    let period = config.pipeline.produce_period;
    platform::spawn_task(&config.producer_task, move || producer.run(period))?;

    let publisher = pipeline.publisher(SessionSink::new(session), config.network.topic);
    platform::spawn_task(&config.publisher_task, move || publisher.run())?;

    let refresher = pipeline.broadcast_refresher(radio, registry);
    let refresh = config.pipeline.broadcast_refresh;
    platform::spawn_task(&config.refresher_task, move || refresher.run(refresh))?;

    let health = pipeline.health();
    let health_period = config.pipeline.health_period;
    platform::spawn_task(&config.health_task, move || health.run(health_period))?;

    info!("all tasks started");

    // Keep the Wi-Fi driver alive
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    use std::time::Duration;

    use hexagon_watch::config::PipelineConfig;
    use hexagon_watch::error::PublishError;
    use hexagon_watch::log_globals::{EVENT_LOG, PIPELINE_LOG};
    use hexagon_watch::producer::RandomBpm;
    use hexagon_watch::{Pipeline, CONFIG};

    println!("{}", env!("VERSION_STRING"));

    let config = PipelineConfig {
        publish_timeout: Duration::from_millis(50),
        ..CONFIG.pipeline
    };
    let pipeline = Pipeline::new(&config);
    let mut producer = pipeline.producer(RandomBpm::from_entropy());
    let mut publisher = pipeline.publisher(
        |topic: &str, payload: &[u8]| -> Result<(), PublishError> {
            println!("publish {} <- {}", topic, String::from_utf8_lossy(payload));
            Ok(())
        },
        CONFIG.network.topic,
    );
    let inbound = pipeline.inbound(CONFIG.network.topic);

    for round in 0..5 {
        producer.tick();
        publisher.cycle();
        if round == 2 {
            inbound.handle(CONFIG.network.topic, b"85");
            publisher.cycle();
        }
    }
    pipeline.health().report();

    for stream in [&PIPELINE_LOG, &EVENT_LOG] {
        while let Some(entry) = stream.drain() {
            println!("[{:10}] {}: {}", entry.timestamp_us, entry.level.as_str(), entry.text());
        }
    }
}
