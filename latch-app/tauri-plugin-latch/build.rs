const COMMANDS: &[&str] = &["authorize", "set_passcode", "key_pressed", "dismiss", "status"];

fn main() {
    tauri_plugin::Builder::new(COMMANDS).build();
}
