pub(crate) mod config;
mod hardware;
mod serial;
mod tasks;
pub(crate) mod types;

use esp_hal::{
    analog::adc::{Adc, AdcConfig, Attenuation},
    gpio::{DriveMode, Level, Output, OutputConfig, Pull},
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart},
};
use gatetimer::{
    active_config,
    laptimer::LapTimer,
    platform::{BusyDelay, GpioBus},
    rx5808::{Rx5808, RssiInput},
    KalmanFilter,
};
use log::{error, info, LevelFilter};

use self::{
    config::{LED_ACTIVE_LOW, TUNING, UART_BAUD},
    hardware::{AdcRssi, ChannelNotifier, ChannelObserver, IndicatorOutput},
    tasks::now_ms,
};

pub(crate) fn run() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);
    esp_println::logger::init_logger(LevelFilter::Info);

    let config = active_config();
    info!(
        "gatetimer: {} MHz, enter={} exit={} drone={}\"",
        config.frequency_mhz,
        config.enter_rssi,
        config.exit_rssi,
        config.drone_size.inches()
    );

    let uart = match Uart::new(peripherals.UART0, UartConfig::default().with_baudrate(UART_BAUD)) {
        Ok(uart) => uart
            .with_rx(peripherals.GPIO3)
            .with_tx(peripherals.GPIO1)
            .into_async(),
        Err(err) => {
            error!("uart: init failed {:?}", err);
            halt_forever();
        }
    };

    let data_config = OutputConfig::default()
        .with_drive_mode(DriveMode::OpenDrain)
        .with_pull(Pull::Up);
    let mut data = Output::new(peripherals.GPIO19, Level::Low, data_config).into_flex();
    data.set_input_enable(true);
    let clock = Output::new(peripherals.GPIO23, Level::Low, OutputConfig::default());
    let select = Output::new(peripherals.GPIO22, Level::High, OutputConfig::default());
    let bus = GpioBus::new(data, clock, select, BusyDelay::new());

    let mut receiver = Rx5808::new(bus, &TUNING, now_ms());
    if let Err(err) = receiver.init() {
        error!("rx5808: init failed {:?}", err);
        halt_forever();
    }

    let mut adc_config = AdcConfig::new();
    let rssi_pin = adc_config.enable_pin(peripherals.GPIO33, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let rssi = RssiInput::new(AdcRssi::new(adc, rssi_pin), &TUNING);

    let timer = LapTimer::new(
        rssi,
        config,
        ChannelNotifier,
        KalmanFilter::from_config(&config.filter),
    )
    .with_observer(ChannelObserver::default());

    let buzzer = IndicatorOutput::new(
        Output::new(peripherals.GPIO27, Level::Low, OutputConfig::default()),
        false,
    );
    let led = IndicatorOutput::new(
        Output::new(peripherals.GPIO21, Level::High, OutputConfig::default()),
        LED_ACTIVE_LOW,
    );

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(tasks::housekeeping_task(receiver, buzzer, led));
        spawner.must_spawn(tasks::timer_task(timer));
        spawner.must_spawn(serial::console_task(uart));
    });
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}

fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
