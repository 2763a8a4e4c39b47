use csv_directory::report::Reporter;

fn main() {
    match csv_directory::run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            Reporter::stdio().fatal(format!("{err:#}"));
            std::process::exit(1);
        }
    }
}
