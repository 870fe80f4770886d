#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use core::ptr::addr_of_mut;
use core::time::Duration;
use esp_backtrace as _;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::tsens::{Config as TsensConfig, TemperatureSensor};
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::Async;
use rand_core::{CryptoRng, RngCore};
use static_cell::StaticCell;

use pyranode_firmware::config::{self, parse_key_hex, NodeConfig};
use pyranode_firmware::housekeeping::EspHousekeeping;
use pyranode_firmware::lora::{Sx1278Driver, Sx1278Pins};
use pyranode_firmware::node::{CycleOutcome, TelemetryNode};
use pyranode_firmware::power::clock::EmbassyClock;
use pyranode_firmware::power::{RetainedStore, RECORD_LEN};
use pyranode_firmware::serial::uart::UartPort;

/// Cycle state record; survives deep sleep and software reset, not power loss
#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut RETAINED_RECORD: [u8; RECORD_LEN] = [0; RECORD_LEN];

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

type Radio = Sx1278Driver<Spi<'static, Async>, Output<'static>, Input<'static>, Output<'static>>;
type Node = TelemetryNode<UartPort<'static>, Radio, EspHousekeeping<'static>, EmbassyClock>;

/// On-chip RNG as an IV source
struct HardwareRng(Rng);

impl RngCore for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.read(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for HardwareRng {}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Warn);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    // RS-485 transceiver on UART1
    let uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(config::serial::BAUD_RATE),
    )
    .unwrap()
    .with_rx(peripherals.GPIO20)
    .with_tx(peripherals.GPIO21);

    // Configure SPI for LoRa
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(1))
            .with_mode(SpiMode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO4)
    .with_miso(peripherals.GPIO5)
    .with_mosi(peripherals.GPIO6)
    .into_async();

    // Configure LoRa control pins
    let lora_pins = Sx1278Pins {
        nss: Output::new(peripherals.GPIO7, Level::High, OutputConfig::default()),
        dio0: Input::new(peripherals.GPIO2, InputConfig::default().with_pull(Pull::Down)),
        nrst: Output::new(peripherals.GPIO10, Level::High, OutputConfig::default()),
    };
    let radio = Sx1278Driver::new(spi, lora_pins);

    // Battery divider on GPIO3, plus the die temperature sensor
    let mut adc_config = AdcConfig::new();
    let battery_pin = adc_config.enable_pin(peripherals.GPIO3, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let tsens = TemperatureSensor::new(peripherals.TSENS, TsensConfig::default()).unwrap();
    let housekeeping = EspHousekeeping::new(adc, battery_pin, tsens);

    let node_config = NodeConfig {
        cipher_key: provisioned_key(),
        ..NodeConfig::default()
    };

    let node = TelemetryNode::new(UartPort::new(uart), radio, housekeeping, EmbassyClock, node_config);
    let rtc = Rtc::new(peripherals.LPWR);
    let rng = HardwareRng(Rng::new());

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(cycle_task(node, rtc, rng));
    })
}

/// Key baked in at build time from `NODE_CIPHER_KEY`
fn provisioned_key() -> Option<[u8; config::crypto::KEY_SIZE]> {
    let text = option_env!("NODE_CIPHER_KEY")?;
    let key = parse_key_hex(text);
    if key.is_none() {
        log::warn!("NODE_CIPHER_KEY is not 32 hex digits, ignoring");
    }
    key
}

/// Run one cycle, then suspend or restart; the next wake starts from main
#[embassy_executor::task]
async fn cycle_task(mut node: Node, mut rtc: Rtc<'static>, mut rng: HardwareRng) {
    // Only this task touches the record
    let record = unsafe { &mut *addr_of_mut!(RETAINED_RECORD) };
    let mut store = RetainedStore::new(record);

    match node.run_cycle(&mut store, &mut rng).await {
        CycleOutcome::Sleep { sleep_us } => {
            let timer = TimerWakeupSource::new(Duration::from_micros(sleep_us));
            rtc.sleep_deep(&[&timer]);
        }
        CycleOutcome::Restart => esp_hal::system::software_reset(),
    }
}
