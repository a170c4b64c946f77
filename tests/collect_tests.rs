use pipestream::enhanced::from_iter;
use pipestream::*;
use serde_json::json;
use tokio::runtime::Runtime;

#[test]
fn test_collect_byte_chunks_into_one_buffer() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let collected = from_iter(vec![vec![1u8, 2], vec![], vec![3, 4, 5]])
            .collect()
            .await
            .unwrap();

        assert_eq!(
            collected,
            Collected::Buffer(TypedBuffer::U8(vec![1, 2, 3, 4, 5]))
        );
    });
}

#[test]
fn test_collect_wide_buffers_keeps_element_type() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let chunks = vec![
            TypedBuffer::from(vec![1u32, 70_000]),
            TypedBuffer::from(vec![3u32]),
        ];
        let buffer = from_iter(chunks)
            .collect()
            .await
            .unwrap()
            .into_buffer()
            .unwrap();

        assert_eq!(buffer, TypedBuffer::U32(vec![1, 70_000, 3]));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.byte_len(), 12);
    });
}

#[test]
fn test_collect_strings_joins_without_separator() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let text = from_iter(vec!["ab".to_string(), "".to_string(), "cd".to_string()])
            .collect()
            .await
            .unwrap()
            .into_text();
        assert_eq!(text, Some("abcd".to_string()));
    });
}

#[test]
fn test_collect_empty_stream_is_empty_items() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let collected = from_iter(Vec::<Vec<u8>>::new()).collect().await.unwrap();
        assert_eq!(collected, Collected::Items(Vec::new()));

        let collected = from_iter(Vec::<String>::new())
            .collect_with(CollectPolicy::Text)
            .await
            .unwrap();
        assert_eq!(collected, Collected::Items(Vec::new()));
    });
}

#[test]
fn test_collect_values_keeps_sequence() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let values = vec![Chunk::from(json!({"id": 1})), Chunk::from(json!({"id": 2}))];
        let collected = from_iter(values.clone()).collect().await.unwrap();
        assert_eq!(collected, Collected::Items(values));
    });
}

#[test]
fn test_collect_with_explicit_text_policy() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let chunks = vec![
            Chunk::from(TypedBuffer::from(vec![1u8, 2])),
            Chunk::from("|"),
            Chunk::from(json!("tail")),
        ];
        let text = from_iter(chunks)
            .collect_with(CollectPolicy::Text)
            .await
            .unwrap();
        assert_eq!(text, Collected::Text("1,2|tail".to_string()));
    });
}

#[test]
fn test_collect_buffer_policy_rejects_text_chunk() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let chunks = vec![
            Chunk::from(TypedBuffer::from(vec![1u8])),
            Chunk::from("not bytes"),
        ];
        let result = from_iter(chunks).collect().await;
        assert_eq!(
            result,
            Err(StreamError::Collect("item 1 is not a buffer".to_string()))
        );
    });
}

#[test]
fn test_collect_surfaces_stream_error() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = EnhancedStream::from_try_iter(vec![Ok(vec![1u8]), Err("truncated input")])
            .collect()
            .await;
        assert_eq!(
            result,
            Err(StreamError::Source("truncated input".to_string()))
        );
    });
}
