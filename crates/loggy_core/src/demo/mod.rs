use std::fs;
use std::path::Path;

use crate::error::AppError;

/// Deterministic synthetic bundle used by tests and demos: a station with a
/// flaky uplink (2 MQTT failures against 1 success, 4 Ethernet flap cycles)
/// and an OCPP registration that is rejected once before being accepted.
pub fn write_demo_bundle(dir: &Path) -> Result<(), AppError> {
    let write = |name: &str, content: &str| -> Result<(), AppError> {
        fs::write(dir.join(name), content).map_err(|e| {
            AppError::new("DEMO_WRITE_FAILED", "Cannot write demo bundle file")
                .with_details(format!("file={name}; err={e}"))
        })
    };

    write(
        "mqtt_client.log",
        "2026-03-01 08:00:00 [INFO] client starting, device id: DEMO-4711A\n\
         2026-03-01 08:00:05 [ERROR] mqtt connect failed: connection refused\n\
         2026-03-01 08:00:35 [ERROR] mqtt connect failed: connection refused\n\
         2026-03-01 08:01:10 [INFO] mqtt connected, session established\n",
    )?;

    write(
        "syslog",
        "Mar  1 08:02:00 station kernel: eth0: link is down\n\
         Mar  1 08:02:10 station kernel: eth0: link is up\n\
         Mar  1 08:03:00 station kernel: eth0: link is down\n\
         Mar  1 08:03:12 station kernel: eth0: link is up\n\
         Mar  1 08:04:00 station kernel: eth0: link is down\n\
         Mar  1 08:04:09 station kernel: eth0: link is up\n\
         Mar  1 08:05:00 station kernel: eth0: link is down\n\
         Mar  1 08:05:14 station kernel: eth0: link is up\n",
    )?;

    write(
        "ocpp.log",
        "2026-03-01 08:06:00 [INFO] sending BootNotification\n\
         2026-03-01 08:06:01 [ERROR] BootNotification rejected by central system\n\
         2026-03-01 08:07:00 [INFO] sending BootNotification\n\
         2026-03-01 08:07:01 [INFO] BootNotification accepted, interval 300\n",
    )?;

    write(
        "station.properties",
        "# demo station configuration\n\
         backend.url=wss://csms.example.net/ocpp\n\
         station.serial=DEMO-4711A\n",
    )?;

    Ok(())
}
