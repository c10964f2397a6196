use esp_hal::Async;
use esp_hal::uart::UartRx;
use esp_println::{print, println};
use heapless::String;
use log::warn;

use crate::controllers::ShellController;

const LINE_LEN: usize = 64;
const PROMPT: &str = "uart:~$ ";

/// Reads operator commands from the console UART, one per line
#[embassy_executor::task]
pub(crate) async fn shell_task(mut rx: UartRx<'static, Async>, controller: ShellController) {
    let mut line = String::<LINE_LEN>::new();
    let mut buf = [0u8; 16];

    println!();
    print!("{}", PROMPT);
    loop {
        let n = match rx.read_async(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("shell: uart read failed: {:?}", e);
                continue;
            }
        };

        for &byte in &buf[..n] {
            match byte {
                b'\r' | b'\n' => {
                    if line.is_empty() {
                        continue;
                    }
                    println!();
                    controller.handle_line(&line);
                    line.clear();
                    print!("{}", PROMPT);
                }
                // Backspace and delete
                0x08 | 0x7F => {
                    line.pop();
                }
                b' '..=b'~' => {
                    if line.push(char::from(byte)).is_err() {
                        println!();
                        warn!("shell: line longer than {} bytes dropped", LINE_LEN);
                        line.clear();
                        print!("{}", PROMPT);
                    }
                }
                _ => {}
            }
        }
    }
}
