//! Key injection.
//!
//! Sessions emit key presses through the `KeyInjector` seam. Two injectors
//! are provided:
//! - `LogInjector`: dry run, only logs the keys
//! - `SendInputInjector` (Windows): hardware-level input via SendInput,
//!   delivered to whatever window has focus

use anyhow::Result;

use super::sequence::KeyRequest;

/// Receives key-press requests, one at a time, in order.
pub trait KeyInjector: Send {
    fn press(&mut self, request: &KeyRequest) -> Result<()>;
}

/// Logs key presses without touching the keyboard.
#[derive(Debug, Default)]
pub struct LogInjector;

impl LogInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjector for LogInjector {
    fn press(&mut self, request: &KeyRequest) -> Result<()> {
        crate::log(&format!(
            "[dry run] key {} (cell {})",
            request.symbol.key(),
            request.index
        ));
        Ok(())
    }
}

#[cfg(windows)]
pub use sendinput::SendInputInjector;

#[cfg(windows)]
mod sendinput {
    use anyhow::{anyhow, Result};
    use std::time::Duration;

    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_KEYUP, VIRTUAL_KEY,
    };

    use super::KeyInjector;
    use crate::solver::sequence::KeyRequest;

    /// How long a key is held down.
    const KEY_HOLD: Duration = Duration::from_millis(30);

    /// Presses keys with SendInput.
    ///
    /// The target window must already have focus; SendInput delivers to the
    /// foreground window the same way a physical keyboard would.
    #[derive(Debug, Default)]
    pub struct SendInputInjector;

    impl SendInputInjector {
        pub fn new() -> Self {
            Self
        }
    }

    fn key_input(vk: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    dwFlags: flags,
                    ..Default::default()
                },
            },
        }
    }

    fn send(input: INPUT) -> Result<()> {
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(anyhow!("SendInput accepted {} of 1 inputs", sent));
        }
        Ok(())
    }

    impl KeyInjector for SendInputInjector {
        fn press(&mut self, request: &KeyRequest) -> Result<()> {
            // Virtual-key codes for letters are their uppercase ASCII values
            let vk = request.symbol.key() as u16;

            send(key_input(vk, KEYBD_EVENT_FLAGS(0)))?;
            std::thread::sleep(KEY_HOLD);
            send(key_input(vk, KEYEVENTF_KEYUP))
        }
    }
}
