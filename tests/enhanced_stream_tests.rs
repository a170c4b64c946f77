use pipestream::enhanced::from_iter;
use pipestream::stream_configuration::QueueConfig;
use pipestream::*;
use quickcheck::{quickcheck, TestResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

#[test]
fn test_skip_filter_map_take() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
            .skip(2)
            .filter(|x| x % 2 == 0)
            .map(|x| x * 2)
            .take(3)
            .to_array()
            .await;
        assert_eq!(result, Ok(vec![8, 12, 16]));
    });
}

#[test]
fn test_scan_running_sum() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(vec![1, 2, 3, 4])
            .scan(0, |acc, x| acc + x)
            .to_array()
            .await;
        assert_eq!(result, Ok(vec![1, 3, 6, 10]));
    });
}

#[test]
fn test_reduce() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let sum = from_iter(1..=5).reduce(0, |acc, x| acc + x).await;
        assert_eq!(sum, Ok(15));

        let empty = from_iter(Vec::<i32>::new())
            .reduce(42, |acc, x| acc + x)
            .await;
        assert_eq!(empty, Ok(42));
    });
}

#[test]
fn test_find_some_every() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        assert_eq!(from_iter(1..=10).find(|x| *x > 4).await, Ok(Some(5)));
        assert_eq!(from_iter(1..=10).find(|x| *x > 40).await, Ok(None));

        assert_eq!(from_iter(1..=10).some(|x| *x == 7).await, Ok(true));
        assert_eq!(from_iter(1..=10).some(|x| *x == 70).await, Ok(false));
        assert_eq!(from_iter(Vec::<i32>::new()).some(|_| true).await, Ok(false));

        assert_eq!(from_iter(1..=10).every(|x| *x > 0).await, Ok(true));
        assert_eq!(from_iter(1..=10).every(|x| *x < 5).await, Ok(false));
        assert_eq!(from_iter(Vec::<i32>::new()).every(|_| false).await, Ok(true));
    });
}

#[test]
fn test_to_array_empty() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(Vec::<String>::new()).to_array().await;
        assert_eq!(result, Ok(Vec::new()));
    });
}

#[test]
fn test_for_each_runs_before_item_is_visible() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let effects = Arc::clone(&seen);
        let observed = Arc::clone(&seen);

        let result = from_iter(vec![1, 2, 3])
            .for_each(move |x| effects.lock().unwrap().push(*x))
            .map(move |x| {
                // the side effect for x has already happened
                let effects = observed.lock().unwrap();
                (x, effects.last().copied())
            })
            .to_array()
            .await;

        assert_eq!(result, Ok(vec![(1, Some(1)), (2, Some(2)), (3, Some(3))]));
    });
}

#[test]
fn test_eval_map_is_sequential() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (current, peak) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));

        let result = from_iter(0..20)
            .eval_map(move |x| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, StreamError>(x * 3)
                }
            })
            .to_array()
            .await;

        assert_eq!(result, Ok((0..20).map(|x| x * 3).collect::<Vec<_>>()));
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn test_eval_for_each_effect_completes_before_item_is_visible() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let effects = Arc::clone(&seen);
        let observed = Arc::clone(&seen);

        let result = from_iter(vec![1, 2, 3])
            .eval_for_each(move |x| {
                let x = *x;
                let effects = Arc::clone(&effects);
                async move {
                    tokio::task::yield_now().await;
                    effects.lock().unwrap().push(x);
                    Ok::<(), StreamError>(())
                }
            })
            .map(move |x| {
                let effects = observed.lock().unwrap();
                (x, effects.last().copied())
            })
            .to_array()
            .await;

        assert_eq!(result, Ok(vec![(1, Some(1)), (2, Some(2)), (3, Some(3))]));
    });
}

#[test]
fn test_eval_filter_is_sequential() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (current, peak) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));

        let result = from_iter(0..20)
            .eval_filter(move |x| {
                let x = *x;
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, StreamError>(x % 3 == 0)
                }
            })
            .to_array()
            .await;

        assert_eq!(result, Ok(vec![0, 3, 6, 9, 12, 15, 18]));
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn test_eval_scan_running_sum() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(vec![1, 2, 3, 4])
            .eval_scan(0, |acc, x| async move {
                tokio::task::yield_now().await;
                Ok::<_, StreamError>(acc + x)
            })
            .to_array()
            .await;
        assert_eq!(result, Ok(vec![1, 3, 6, 10]));
    });
}

#[test]
fn test_async_stage_errors_reach_terminal() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(1..=5)
            .eval_filter(|x| {
                let x = *x;
                async move {
                    if x == 3 {
                        Err(StreamError::transform("lookup failed"))
                    } else {
                        Ok(true)
                    }
                }
            })
            .to_array()
            .await;
        assert_eq!(result, Err(StreamError::Transform("lookup failed".to_string())));

        let result = from_iter(1..=5)
            .eval_for_each(|x| {
                let x = *x;
                async move {
                    if x == 2 {
                        Err(StreamError::IO("audit log unavailable".to_string()))
                    } else {
                        Ok(())
                    }
                }
            })
            .reduce(0, |acc, x| acc + x)
            .await;
        assert_eq!(
            result,
            Err(StreamError::IO("audit log unavailable".to_string()))
        );
    });
}

#[test]
fn test_scan_long_input_does_not_overflow() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let input = vec![i16::MAX; 200];
        let result = from_iter(input)
            .scan(7i64, |acc, x| acc.wrapping_mul(2).wrapping_add(x as i64))
            .to_array()
            .await
            .unwrap();
        assert_eq!(result.len(), 200);
        assert_eq!(result[0], 7 * 2 + i16::MAX as i64);
    });
}

#[test]
fn test_transform_error_reaches_terminal() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(1..=5)
            .try_map(|x| if x == 3 { Err(format!("bad item {}", x)) } else { Ok(x) })
            .map(|x| x * 10)
            .to_array()
            .await;
        assert_eq!(result, Err(StreamError::Transform("bad item 3".to_string())));

        let found = from_iter(1..=5)
            .try_filter(|x| if *x == 2 { Err("predicate exploded") } else { Ok(false) })
            .find(|_| true)
            .await;
        assert_eq!(
            found,
            Err(StreamError::Transform("predicate exploded".to_string()))
        );
    });
}

#[test]
fn test_source_error_is_not_swallowed() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = EnhancedStream::from_try_iter(vec![Ok(1), Ok(2), Err("disk gone")])
            .map(|x: i32| x + 1)
            .reduce(0, |acc, x| acc + x)
            .await;
        assert_eq!(result, Err(StreamError::Source("disk gone".to_string())));
    });
}

#[test]
fn test_second_reader_gets_concurrent_access_error() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let source = Readable::from_iter(vec![1, 2, 3]);
        let _reader = source.get_reader().unwrap();

        let result = EnhancedStream::new(source.clone()).to_array().await;
        assert_eq!(result, Err(StreamError::ConcurrentAccess));

        // Deferred to the terminal when a stage is attached to a locked source
        let result = EnhancedStream::new(source).map(|x| x * 2).to_array().await;
        assert_eq!(result, Err(StreamError::ConcurrentAccess));
    });
}

#[test]
fn test_custom_transformer_with_flush() {
    struct Batches {
        size: usize,
        current: Vec<i32>,
    }

    #[async_trait::async_trait]
    impl Transformer<i32, Vec<i32>> for Batches {
        async fn transform(&mut self, item: i32, emitter: &mut Emitter<Vec<i32>>) -> StreamResult<()> {
            self.current.push(item);
            if self.current.len() == self.size {
                emitter.emit(std::mem::take(&mut self.current));
            }
            Ok(())
        }

        async fn flush(&mut self, emitter: &mut Emitter<Vec<i32>>) -> StreamResult<()> {
            if !self.current.is_empty() {
                emitter.emit(std::mem::take(&mut self.current));
            }
            Ok(())
        }
    }

    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(1..=7)
            .transform(Batches { size: 3, current: Vec::new() })
            .to_array()
            .await;
        assert_eq!(result, Ok(vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]));
    });
}

#[test]
fn test_flush_error_is_a_stage_error() {
    struct FailsOnFlush;

    #[async_trait::async_trait]
    impl Transformer<i32, i32> for FailsOnFlush {
        async fn transform(&mut self, item: i32, emitter: &mut Emitter<i32>) -> StreamResult<()> {
            emitter.emit(item);
            Ok(())
        }

        async fn flush(&mut self, _emitter: &mut Emitter<i32>) -> StreamResult<()> {
            Err(StreamError::transform("incomplete trailer"))
        }
    }

    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let result = from_iter(1..=3).transform(FailsOnFlush).to_array().await;
        assert_eq!(
            result,
            Err(StreamError::Transform("incomplete trailer".to_string()))
        );
    });
}

#[tokio::test]
async fn test_find_cancels_upstream_producer() {
    let (handle, readable) = push_channel(&QueueConfig { high_water_mark: 1 });
    let producer = tokio::spawn(async move {
        let mut sent = 0u64;
        while handle.enqueue(sent).await.is_ok() {
            sent += 1;
        }
        sent
    });

    let found = EnhancedStream::new(readable)
        .map(|x| x * 2)
        .find(|x| *x == 6)
        .await;
    assert_eq!(found, Ok(Some(6)));

    // The producer only stops once the reader side has been dropped
    let sent = producer.await.unwrap();
    assert!(sent >= 4);
}

#[tokio::test]
async fn test_take_stops_infinite_source() {
    let (handle, readable) = push_channel(&QueueConfig { high_water_mark: 2 });
    let producer = tokio::spawn(async move {
        let mut next = 0u32;
        while handle.enqueue(next).await.is_ok() {
            next += 1;
        }
    });

    let result = EnhancedStream::new(readable).take(3).to_array().await;
    assert_eq!(result, Ok(vec![0, 1, 2]));
    producer.await.unwrap();
}

// ================================
// Properties
// ================================

fn run<F: std::future::Future>(fut: F) -> F::Output {
    Runtime::new().unwrap().block_on(fut)
}

#[test]
fn prop_map_matches_iterator_map() {
    fn prop(input: Vec<i32>) -> bool {
        let expected: Vec<i64> = input.iter().map(|&x| x as i64 * 3 - 1).collect();
        let actual = run(from_iter(input).map(|x| x as i64 * 3 - 1).to_array());
        actual == Ok(expected)
    }
    quickcheck(prop as fn(Vec<i32>) -> bool);
}

#[test]
fn prop_filter_keeps_order() {
    fn prop(input: Vec<i32>) -> bool {
        let expected: Vec<i32> = input.iter().copied().filter(|x| x % 3 == 0).collect();
        let actual = run(from_iter(input).filter(|x| x % 3 == 0).to_array());
        actual == Ok(expected)
    }
    quickcheck(prop as fn(Vec<i32>) -> bool);
}

#[test]
fn prop_take_is_prefix() {
    fn prop(input: Vec<u8>, n: u8) -> bool {
        let n = n as usize % 20;
        let expected: Vec<u8> = input.iter().copied().take(n).collect();
        let actual = run(from_iter(input).take(n).to_array());
        actual == Ok(expected)
    }
    quickcheck(prop as fn(Vec<u8>, u8) -> bool);
}

#[test]
fn prop_skip_then_take_is_slice() {
    fn prop(input: Vec<u16>, n: u8, m: u8) -> TestResult {
        let (n, m) = (n as usize % 16, m as usize % 16);
        let start = n.min(input.len());
        let end = (n + m).min(input.len());
        let expected = input[start..end].to_vec();
        let actual = run(from_iter(input).skip(n).take(m).to_array());
        TestResult::from_bool(actual == Ok(expected))
    }
    quickcheck(prop as fn(Vec<u16>, u8, u8) -> TestResult);
}

#[test]
fn prop_scan_is_prefix_fold() {
    fn step(acc: i64, x: i16) -> i64 {
        acc.wrapping_mul(2).wrapping_add(x as i64)
    }

    fn prop(input: Vec<i16>) -> bool {
        let expected: Vec<i64> = (1..=input.len())
            .map(|k| input[..k].iter().fold(7i64, |acc, &x| step(acc, x)))
            .collect();
        let actual = run(from_iter(input).scan(7i64, step).to_array());
        actual == Ok(expected)
    }
    quickcheck(prop as fn(Vec<i16>) -> bool);
}
