use std::path::PathBuf;
use std::time::Instant;

use larynx::{Engine, SynthesisParams};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let voice_dir = PathBuf::from(args.next().unwrap_or_else(|| "voices/ljspeech".to_string()));
    let text = args.next().unwrap_or_else(|| {
        "Hello! This is an offline neural text to speech voice running locally.".to_string()
    });

    let load_start = Instant::now();
    let engine = Engine::load(
        &voice_dir,
        &voice_dir.join("voice.json"),
        &voice_dir.join("lexicon"),
    )?;
    println!("Voice loaded in {:.2?}", load_start.elapsed());
    println!(
        "Sample rate: {} Hz, locales: {:?}",
        engine.config().sample_rate,
        engine.lexicon().locale_names()
    );

    let synth_start = Instant::now();
    let mut session = engine.new_session();
    session.start(&text, SynthesisParams::default())?;
    let result = session.drain()?;
    let synth_dur = synth_start.elapsed();

    let speedup = result.duration_secs() / synth_dur.as_secs_f64();
    println!(
        "Synthesized {:.2}s audio in {:.2?} ({:.1}x real-time)",
        result.duration_secs(),
        synth_dur,
        speedup
    );

    result.write_wav(&PathBuf::from("output.wav"))?;
    println!("Saved to output.wav");

    Ok(())
}
