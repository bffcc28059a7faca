use core::fmt::Write as _;

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use heapless::String;

use extender_core::console::{self, ConsoleReply};
use extender_core::extender::ConsoleStatus;

use crate::charge::{ControllerReply, ControllerRequest, ReplyReceiver, RequestSender};

const CONSOLE_BAUD: u32 = 115_200;
const CONSOLE_BUFFER_SIZE: usize = 128;
const MAX_LINE_LEN: usize = 64;

static mut UART_TX_BUFFER: [u8; CONSOLE_BUFFER_SIZE] = [0; CONSOLE_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; CONSOLE_BUFFER_SIZE] = [0; CONSOLE_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    requests: RequestSender<'static>,
    replies: ReplyReceiver<'static>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
        .expect("failed to initialize console UART")
    };
    let (mut uart_tx, mut uart_rx) = uart.split();

    let mut line: String<MAX_LINE_LEN> = String::new();
    let mut ingress = [0u8; 16];

    loop {
        match uart_rx.read(&mut ingress).await {
            Ok(count) if count > 0 => {
                for &byte in &ingress[..count] {
                    if byte == b'\r' || byte == b'\n' {
                        if !line.is_empty() {
                            service_line(&line, requests, replies, &mut uart_tx).await;
                            line.clear();
                        }
                    } else if line.push(byte as char).is_err() {
                        defmt::warn!("console: line too long, dropping");
                        line.clear();
                    }
                }
            }
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("console: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}

async fn service_line<W: Write>(
    line: &str,
    requests: RequestSender<'static>,
    replies: ReplyReceiver<'static>,
    out: &mut W,
) {
    match console::parse_line(line) {
        Ok(command) => {
            requests.send(ControllerRequest::Console(command)).await;
            let reply = replies.receive().await;
            send_reply(&reply, out).await;
        }
        Err(error) => {
            let mut text: String<96> = String::new();
            let _ = write!(text, "error: {error}\r\n");
            write_all(out, text.as_bytes()).await;
        }
    }
}

async fn send_reply<W: Write>(reply: &ControllerReply, out: &mut W) {
    match reply {
        ControllerReply::Console(ConsoleReply::Status(status)) => {
            send_status(status, out).await;
        }
        _ => write_all(out, b"ok\r\n").await,
    }
}

async fn send_status<W: Write>(status: &ConsoleStatus, out: &mut W) {
    let mut text: String<256> = String::new();

    let _ = write!(
        text,
        "extender {} stage={}\r\n",
        if status.disabled { "disabled" } else { "enabled" },
        status.stage.ordinal()
    );
    let _ = write!(
        text,
        "trigger={}s remaining={}s\r\n",
        status.trigger_interval.as_secs(),
        status.stage1_remaining.map_or(0, |d| d.as_secs())
    );
    let _ = write!(
        text,
        "trigger2 remaining={}s\r\n",
        status.stage2_remaining.map_or(0, |d| d.as_secs())
    );
    let _ = write!(
        text,
        "reset={}s remaining={}s\r\n",
        status.reset_interval.as_secs(),
        status.reset_remaining.map_or(0, |d| d.as_secs())
    );
    let _ = write!(
        text,
        "sustain={}-{}\r\n",
        status.sustain_lower, status.sustain_upper
    );
    match status.cap {
        Some(cap) if cap.override_active() => {
            let _ = write!(text, "cap={} override\r\n", cap.value());
        }
        Some(cap) => {
            let _ = write!(text, "cap={}\r\n", cap.value());
        }
        None => {
            let _ = write!(text, "cap=unread\r\n");
        }
    }

    write_all(out, text.as_bytes()).await;
}

async fn write_all<W: Write>(out: &mut W, data: &[u8]) {
    let mut written = 0usize;
    while written < data.len() {
        match out.write(&data[written..]).await {
            Ok(count) if count > 0 => written += count,
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("console: UART write error");
                break;
            }
        }
    }
}
