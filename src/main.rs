fn main() {
    if let Err(error) = nameday_reminder::run() {
        eprintln!("nameday-reminder: {error}");
        std::process::exit(1);
    }
}
