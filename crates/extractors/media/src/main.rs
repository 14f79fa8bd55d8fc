use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: intake-extract-media <file-path>");
        eprintln!();
        eprintln!("Reads an image's dimensions and EXIF capture facts and prints them as JSON.");
        process::exit(1);
    }

    let path = Path::new(&args[1]);
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(1);
        }
    };

    match intake_extract_media::read_facts(&bytes) {
        Ok(facts) => match serde_json::to_string_pretty(&facts) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing to JSON: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error probing image {}: {e:#}", path.display());
            process::exit(1);
        }
    }
}
