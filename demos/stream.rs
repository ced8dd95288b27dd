use std::path::PathBuf;
use std::time::Instant;

use larynx::{Engine, SynthesisParamsBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let voice_dir = PathBuf::from(args.next().unwrap_or_else(|| "voices/ljspeech".to_string()));
    let text = args.next().unwrap_or_else(|| {
        "Streaming synthesis yields audio sentence by sentence. \
         Long passages can start playing before the whole text is rendered. \
         This demo prints each chunk as it arrives."
            .to_string()
    });

    let engine = Engine::load(
        &voice_dir,
        &voice_dir.join("voice.json"),
        &voice_dir.join("lexicon"),
    )?;

    let params = SynthesisParamsBuilder::default()
        .speech_rate(Some(1.0))
        .seed(Some(42))
        .build()?;

    let mut session = engine.new_session();
    session.start(&text, params)?;

    let start = Instant::now();
    let mut chunk_index = 0;
    while let Some(chunk) = session.next()? {
        chunk_index += 1;
        println!(
            "chunk {chunk_index}: {:.2}s ({} PCM bytes{}) at +{:.2?}",
            chunk.duration_secs(),
            chunk.to_pcm16_bytes().len(),
            if chunk.is_final { ", final" } else { "" },
            start.elapsed()
        );
        // A player would enqueue chunk.to_pcm16_bytes() here.
    }

    Ok(())
}
