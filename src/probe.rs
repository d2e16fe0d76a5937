use std::sync::Mutex;

#[cfg(any(target_os = "macos", target_os = "linux"))]
use std::process::Command;

#[cfg(target_os = "linux")]
use sysinfo::{Pid, ProcessesToUpdate};
use sysinfo::System;

use crate::db::models::WindowSnapshot;

/// Answers "what process and window title currently has focus".
///
/// Implementations must be cheap enough to call once per tick and must map
/// every failure mode to `None`; a probe miss is an ordinary no-observation
/// tick, never an error.
pub trait WindowProbe: Send + Sync {
    fn active_window(&self) -> Option<WindowSnapshot>;
}

/// Best-effort probe for the host platform. On unsupported platforms every
/// call reports no foreground window, so the daemon still runs and serves
/// queries, it just records nothing.
pub struct SystemProbe {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    #[cfg(target_os = "linux")]
    fn process_name(&self, pid: u32) -> Option<String> {
        let mut system = self.system.lock().ok()?;
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        system
            .process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
const OSA_ACTIVE_WINDOW: &str = r#"
tell application "System Events"
    set frontApp to first application process whose frontmost is true
    set appName to name of frontApp
    set winTitle to ""
    try
        set winTitle to name of front window of frontApp
    end try
end tell
appName & linefeed & winTitle
"#;

impl WindowProbe for SystemProbe {
    #[cfg(target_os = "macos")]
    fn active_window(&self) -> Option<WindowSnapshot> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(OSA_ACTIVE_WINDOW)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let text = String::from_utf8(output.stdout).ok()?;
        let mut lines = text.lines();
        let app = lines.next()?.trim().to_string();
        if app.is_empty() {
            return None;
        }
        let title = lines.next().unwrap_or("").trim().to_string();

        Some(WindowSnapshot { app, title })
    }

    #[cfg(target_os = "linux")]
    fn active_window(&self) -> Option<WindowSnapshot> {
        let window_id = xdotool(&["getactivewindow"])?;
        let pid: u32 = xdotool(&["getwindowpid", &window_id])?.parse().ok()?;
        let app = self.process_name(pid)?;
        // A window without a name is still a focused app.
        let title = xdotool(&["getwindowname", &window_id]).unwrap_or_default();

        Some(WindowSnapshot { app, title })
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn active_window(&self) -> Option<WindowSnapshot> {
        None
    }
}

#[cfg(target_os = "linux")]
fn xdotool(args: &[&str]) -> Option<String> {
    let output = Command::new("xdotool").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
