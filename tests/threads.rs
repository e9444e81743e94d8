use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use threadprobe::{begin_probe, find_probe, nest_probe, probe_count, top_probe, Probe};

#[test]
fn should_keep_independent_stacks_when_threads_nest_concurrently() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let root = begin_probe(format!("root-{}", i)).unwrap();
                for level in 0..=i {
                    nest_probe(format!("level-{}", level)).unwrap();
                }
                let depth = probe_count();
                root.end().unwrap();
                (depth, probe_count())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (depth, after) = handle.join().unwrap();
        assert_eq!(depth, i + 2);
        assert_eq!(after, 0);
    }
}

#[test]
fn should_read_probe_on_other_thread_when_handed_over() {
    let (tx, rx) = mpsc::channel::<Probe>();

    let producer = thread::Builder::new()
        .name("producer".into())
        .spawn(move || {
            let outer = begin_probe("outer").unwrap();
            thread::sleep(Duration::from_millis(2));
            let inner = nest_probe("inner").unwrap();
            thread::sleep(Duration::from_millis(2));
            inner.end().unwrap();
            outer.end().unwrap();
            tx.send(inner).unwrap();
        })
        .unwrap();
    producer.join().unwrap();

    let inner = rx.recv().unwrap();
    assert_eq!(inner.begin_bracket().thread_name, "producer");
    assert!(!inner.is_open());
    assert!(inner.elapsed_since_root() >= inner.elapsed_since_outer());
    assert_eq!(inner.record(1).thread_name, "producer");
    assert_eq!(probe_count(), 0);
    assert!(top_probe().is_none());
    assert!(find_probe("inner").is_none());
}

#[test]
fn should_end_probe_after_its_thread_exited() {
    let probe = thread::spawn(|| begin_probe("orphan").unwrap())
        .join()
        .unwrap();
    assert!(probe.is_open());
    probe.end().unwrap();
    assert!(!probe.is_open());
}
