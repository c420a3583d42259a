use core::{fmt::Write, sync::atomic::Ordering};

use embassy_time::{with_timeout, Duration};
use gatetimer::console::{parse_command, ConsoleCommand, LineBuffer};
use log::info;

use super::{
    config::{CONSOLE_EVENTS, CONSOLE_POLL_MS, REQUESTED_FREQUENCY_MHZ, TIMER_COMMANDS},
    types::{ConsoleEvent, SerialUart, TimerCommand},
};

#[embassy_executor::task]
pub(crate) async fn console_task(mut uart: SerialUart) {
    let mut lines = LineBuffer::new();
    let mut rx = [0u8; 1];

    let _ = uart_write_all(&mut uart, b"gatetimer ready\r\n").await;

    loop {
        while let Ok(event) = CONSOLE_EVENTS.try_receive() {
            write_event(&mut uart, event).await;
        }

        let Ok(Ok(1)) =
            with_timeout(Duration::from_millis(CONSOLE_POLL_MS), uart.read_async(&mut rx)).await
        else {
            continue;
        };
        let Some(line) = lines.push(rx[0]) else {
            continue;
        };

        let response: &[u8] = match parse_command(line) {
            Some(command) => {
                if dispatch(command) {
                    b"OK\r\n"
                } else {
                    b"BUSY\r\n"
                }
            }
            None => b"CMD ERR\r\n",
        };
        let _ = uart_write_all(&mut uart, response).await;
    }
}

fn dispatch(command: ConsoleCommand) -> bool {
    let timer_command = match command {
        ConsoleCommand::Frequency(mhz) => {
            REQUESTED_FREQUENCY_MHZ.store(u32::from(mhz), Ordering::Relaxed);
            info!("console: frequency {} MHz requested", mhz);
            return true;
        }
        ConsoleCommand::Start => TimerCommand::Start,
        ConsoleCommand::Stop => TimerCommand::Stop,
        ConsoleCommand::NoiseCalibration { active } => TimerCommand::NoiseCalibration { active },
        ConsoleCommand::CrossingCalibration { active } => {
            TimerCommand::CrossingCalibration { active }
        }
        ConsoleCommand::Status => TimerCommand::Status,
    };
    TIMER_COMMANDS.try_send(timer_command).is_ok()
}

async fn write_event(uart: &mut SerialUart, event: ConsoleEvent) {
    let mut line = heapless::String::<64>::new();
    let _ = match event {
        ConsoleEvent::Lap { number, lap_ms } => {
            write!(&mut line, "LAP {} {}.{:03}\r\n", number, lap_ms / 1000, lap_ms % 1000)
        }
        ConsoleEvent::CalibrationResult {
            crossing,
            max,
            samples,
        } => write!(
            &mut line,
            "{} MAX={} SAMPLES={}\r\n",
            if crossing { "CROSSCAL" } else { "NOISECAL" },
            max,
            samples
        ),
        ConsoleEvent::Status {
            running,
            rssi,
            frequency_mhz,
            laps,
        } => write!(
            &mut line,
            "STATUS RUNNING={} RSSI={} FREQ={} LAPS={}\r\n",
            u8::from(running),
            rssi,
            frequency_mhz,
            laps
        ),
    };
    let _ = uart_write_all(uart, line.as_bytes()).await;
}

async fn uart_write_all(uart: &mut SerialUart, mut bytes: &[u8]) -> Result<(), ()> {
    while !bytes.is_empty() {
        match uart.write_async(bytes).await {
            Ok(0) | Err(_) => return Err(()),
            Ok(written) => bytes = &bytes[written..],
        }
    }
    Ok(())
}
