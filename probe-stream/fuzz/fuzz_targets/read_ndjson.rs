#![no_main]

use bytes::Bytes;
use futures::StreamExt;
use libfuzzer_sys::fuzz_target;
use probe_stream::{ReadEvent, read_incremental_bytes};

// First byte picks the chunk size so line and UTF-8 boundaries land anywhere.
fuzz_target!(|data: &[u8]| {
    let Some((&size, body)) = data.split_first() else {
        return;
    };
    let size = usize::from(size).max(1);
    let chunks: Vec<Result<Bytes, std::io::Error>> = body
        .chunks(size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    futures::executor::block_on(async {
        let mut events = std::pin::pin!(read_incremental_bytes(futures::stream::iter(chunks)));
        let mut text = String::new();
        let mut finished = false;

        while let Some(event) = events.next().await {
            assert!(!finished, "event after the final one");
            match event {
                Ok(ReadEvent::Fragment(fragment)) => {
                    assert!(!fragment.is_empty());
                    text.push_str(&fragment);
                }
                Ok(ReadEvent::Done(result)) => {
                    assert_eq!(result.full_text, text);
                    finished = true;
                }
                Err(err) => {
                    if let Some(partial) = err.partial_text() {
                        assert_eq!(partial, text);
                    }
                    finished = true;
                }
            }
        }
        assert!(finished, "stream ended without Done or an error");
    });
});
