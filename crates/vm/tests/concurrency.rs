//! 多个地址空间共享一个很小的帧池时的并发缺页

mod common;

use std::sync::Arc;
use std::thread;

use common::{PAGE, TestFile, frame_table, setup, space};
use test_support::mock::mm::MockFile;
use vm::{Backing, PageState};

const THREADS: usize = 4;
const PAGES_PER_THREAD: usize = 8;
const BASE: usize = 0x1000_0000;

fn pattern(thread: usize, page: usize, round: usize) -> Vec<u8> {
    (0..PAGE).map(|i| ((i + thread * 31 + page * 7 + round) % 251) as u8).collect()
}

#[test]
fn concurrent_faults_preserve_every_page() {
    setup();
    let frames = frame_table(4, THREADS * PAGES_PER_THREAD * 2);

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let frames = frames.clone();
            thread::spawn(move || {
                let (space, _pt) = space(&frames);
                for p in 0..PAGES_PER_THREAD {
                    space.allocate_zero(BASE + p * PAGE, true).expect("allocate");
                }
                for round in 0..3 {
                    for p in 0..PAGES_PER_THREAD {
                        let va = BASE + p * PAGE;
                        space.pin(va, true).expect("pin for write");
                        space.write_bytes_at(va, &pattern(t, p, round)).expect("write");
                        space.unpin(va);
                    }
                    for p in 0..PAGES_PER_THREAD {
                        let va = BASE + p * PAGE;
                        let mut buf = vec![0u8; PAGE];
                        space.pin(va, false).expect("pin for read");
                        space.read_bytes_at(va, &mut buf).expect("read");
                        space.unpin(va);
                        assert_eq!(buf, pattern(t, p, round), "thread {} page {} round {}", t, p, round);
                    }
                }
                // 退出前所有页都还在
                assert_eq!(space.len(), PAGES_PER_THREAD);
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    // 地址空间随线程退出而销毁
    assert_eq!(frames.resident(), 0);
    assert_eq!(frames.swap().used_slots(), 0);
    assert_eq!(frames.pool().free_frames(), frames.capacity());
}

#[test]
fn file_backed_pages_survive_eviction_pressure() {
    setup();
    let frames = frame_table(2, 16);
    let (space, pt) = space(&frames);
    let file = Arc::new(TestFile(MockFile::patterned(6 * PAGE, 11)));

    for p in 0..6 {
        space
            .allocate(file.clone(), p * PAGE, PAGE, BASE + p * PAGE, false)
            .expect("allocate");
    }
    for p in (0..6).chain((0..6).rev()) {
        space.resolve_fault(BASE + p * PAGE).expect("fault");
        pt.0.touch((BASE + p * PAGE) / PAGE, false);
    }

    let pages: Vec<_> = (0..6).map(|p| space.lookup(BASE + p * PAGE).expect("page")).collect();
    let resident = pages.iter().filter(|p| p.is_resident()).count();
    let swapped = pages
        .iter()
        .filter(|p| matches!(p.state(), PageState::Absent(Backing::Swapped(_))))
        .count();
    assert_eq!(resident, 2);
    assert_eq!(resident + swapped, 6);
    assert_eq!(swapped, frames.swap().used_slots());

    for p in 0..6 {
        let va = BASE + p * PAGE;
        let mut buf = vec![0u8; PAGE];
        space.pin(va, false).expect("pin");
        space.read_bytes_at(va, &mut buf).expect("read");
        space.unpin(va);
        assert_eq!(buf, &file.0.data()[p * PAGE..(p + 1) * PAGE]);
    }
}
