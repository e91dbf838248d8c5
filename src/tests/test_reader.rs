use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::errors::JournalError;
use crate::tests::context::new_testing;
use crate::tests::context::TestContext;
use crate::types::ASQN_IGNORE;
use crate::JournalReader;

fn read_indexes(reader: &mut JournalReader) -> Result<Vec<u64>, JournalError> {
    reader.map(|r| r.map(|r| r.index)).collect()
}

/// Records with asqn 5, 5, 6, 7: seeking to asqn 6 lands on the third one.
#[test]
fn test_seek_to_asqn() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    for (asqn, data) in [(5, "a"), (5, "b"), (6, "c"), (7, "d")] {
        journal.append(asqn, data.as_bytes())?;
    }
    journal.flush()?;

    let mut reader = journal.open_reader();

    assert_eq!(3, reader.seek_to_asqn(6));
    let record = reader.next().unwrap()?;
    assert_eq!(3, record.index);
    assert_eq!(6, record.asqn);
    assert_eq!(b"c".to_vec(), record.data);

    assert_eq!(1, reader.seek_to_asqn(0));
    assert_eq!(1, reader.seek_to_asqn(5));
    assert_eq!(4, reader.seek_to_asqn(7));

    // No record with asqn >= 8: positioned after the last record.
    assert_eq!(5, reader.seek_to_asqn(8));
    assert!(reader.next().is_none());

    Ok(())
}

#[test]
fn test_seek_to_asqn_skips_records_without_asqn() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    journal.append(ASQN_IGNORE, b"initial")?;
    journal.append(3, b"a")?;
    journal.append(ASQN_IGNORE, b"initial")?;
    journal.append(4, b"b")?;
    journal.set_commit_index(2)?;

    let mut reader = journal.open_reader();
    assert_eq!(2, reader.seek_to_asqn(0));
    assert_eq!(4, reader.seek_to_asqn(4));

    // Targets at or below ASQN_IGNORE still skip the records without asqn.
    assert_eq!(2, reader.seek_to_asqn(ASQN_IGNORE));
    assert_eq!(2, reader.seek_to_asqn(i64::MIN));
    assert_eq!(3, reader.next().unwrap()?.asqn);

    // A committed reader only sees [1, 2].
    let mut committed = journal.open_committed_reader();
    assert_eq!(2, committed.seek_to_asqn(3));
    assert_eq!(3, committed.seek_to_asqn(4));
    assert_eq!(2, committed.seek_to_asqn(i64::MIN));

    Ok(())
}

#[test]
fn test_committed_reader_visibility() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    let mut reader = journal.open_committed_reader();
    assert!(reader.is_committed_only());
    assert!(!reader.has_next());

    for i in 1..=5 {
        journal.append(i, b"x")?;
    }
    journal.flush()?;

    assert!(!reader.has_next());
    assert!(reader.next().is_none());

    journal.set_commit_index(2)?;
    assert!(reader.has_next());
    assert_eq!(vec![1, 2], read_indexes(&mut reader)?);

    journal.set_commit_index(4)?;
    assert_eq!(vec![3, 4], read_indexes(&mut reader)?);

    // An uncommitted reader sees everything.
    let mut all = journal.open_reader();
    assert_eq!(vec![1, 2, 3, 4, 5], read_indexes(&mut all)?);

    Ok(())
}

#[test]
fn test_seek() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    for i in 1..=5 {
        journal.append(i, b"x")?;
    }
    journal.set_commit_index(3)?;

    let mut reader = journal.open_committed_reader();

    assert_eq!(2, reader.seek(2));
    assert_eq!(2, reader.next_index());
    assert_eq!(vec![2, 3], read_indexes(&mut reader)?);

    // Clamped to the visible range plus one.
    assert_eq!(4, reader.seek(10));
    assert_eq!(1, reader.seek(0));

    assert_eq!(3, reader.seek_to_last());
    assert_eq!(vec![3], read_indexes(&mut reader)?);

    assert_eq!(1, reader.seek_to_first());

    let mut all = journal.open_reader();
    assert_eq!(5, all.seek_to_last());

    Ok(())
}

#[test]
fn test_seek_to_last_of_empty_journal() -> Result<(), JournalError> {
    let (_ctx, journal) = new_testing()?;

    let mut reader = journal.open_reader();
    assert_eq!(0, reader.seek_to_last());
    assert_eq!(1, reader.next_index());
    assert!(reader.next().is_none());

    Ok(())
}

#[test]
fn test_reader_rewinds_on_truncation() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    for i in 1..=5 {
        journal.append(i, b"old")?;
    }

    let mut reader = journal.open_reader();
    assert_eq!(vec![1, 2, 3, 4, 5], read_indexes(&mut reader)?);
    assert_eq!(6, reader.next_index());

    journal.delete_after(2)?;
    assert_eq!(3, reader.next_index());

    journal.append(30, b"new")?;

    let record = reader.next().unwrap()?;
    assert_eq!(3, record.index);
    assert_eq!(30, record.asqn);
    assert_eq!(b"new".to_vec(), record.data);

    Ok(())
}

#[test]
fn test_reader_skips_compacted_records() -> Result<(), JournalError> {
    let mut ctx = TestContext::new()?;
    ctx.config.segment_max_size = Some(29 + 34 * 2);

    let mut journal = ctx.new_journal()?;
    for i in 1..=5 {
        journal.append(i, b"x")?;
    }
    journal.set_commit_index(5)?;

    let mut reader = journal.open_committed_reader();
    assert_eq!(1, reader.next_index());

    assert_eq!(5, journal.compact(5)?);

    assert_eq!(5, reader.next_index());
    assert_eq!(vec![5], read_indexes(&mut reader)?);

    Ok(())
}

#[test]
fn test_concurrent_readers() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    let readers = (0..4).map(|_| journal.open_committed_reader()).collect::<Vec<_>>();

    let handles = readers
        .into_iter()
        .map(|mut reader| {
            std::thread::spawn(move || {
                let mut got = vec![];
                while got.len() < 100 {
                    match reader.next() {
                        Some(res) => got.push(res.map(|r| r.index)?),
                        None => std::thread::yield_now(),
                    }
                }
                Ok::<_, JournalError>(got)
            })
        })
        .collect::<Vec<_>>();

    for i in 1..=100 {
        journal.append(i, format!("{}", i).as_bytes())?;
        journal.set_commit_index(i as u64)?;
    }

    let want = (1..=100).collect::<Vec<u64>>();
    for h in handles {
        assert_eq!(want, h.join().unwrap()?);
    }

    Ok(())
}

/// Readers running while the writer appends and removes uncommitted records
/// only return whole records that were in the journal when they were read.
#[test]
fn test_readers_during_truncation() -> Result<(), JournalError> {
    let (_ctx, mut journal) = new_testing()?;

    let stop = Arc::new(AtomicBool::new(false));

    let handles = (0..4)
        .map(|_| {
            let mut reader = journal.open_reader();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut n = 0;
                while !stop.load(Ordering::Relaxed) {
                    match reader.next() {
                        Some(res) => {
                            let record = res?;
                            assert_eq!(record.asqn.to_string().into_bytes(), record.data);
                            n += 1;
                        }
                        None => {
                            reader.seek_to_first();
                            std::thread::yield_now();
                        }
                    }
                }
                Ok::<_, JournalError>(n)
            })
        })
        .collect::<Vec<_>>();

    for round in 0..50i64 {
        for i in 0..10 {
            let asqn = round * 100 + i;
            journal.append(asqn, asqn.to_string().as_bytes())?;
        }
        let last = journal.last_index();
        journal.delete_after(last - 5)?;
    }

    stop.store(true, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap()?;
    }

    assert_eq!(250, journal.last_index());

    Ok(())
}
