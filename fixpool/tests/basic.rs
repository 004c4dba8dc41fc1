use std::{mem, ptr::{self, NonNull}, sync::Once};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use fixpool::{ConfigurationError, Error, FixedAllocator, OsPlatform, Platform};

//
//  Tests
//

#[test]
fn initialize_errors() {
    install_subscriber();

    let error = FixedAllocator::<u32>::new(5, 32).unwrap_err();
    assert_eq!(Error::Configuration(ConfigurationError::BlockNotMultipleOfChunk { block_size: 32, chunk_size: 5 }), error);
    assert!(error.to_string().contains("must fit"), "{}", error);

    let error = FixedAllocator::<u32>::new(2, 32).unwrap_err();
    assert!(error.to_string().contains("at least"), "{}", error);

    let error = FixedAllocator::<u32>::new(8, page_size() + 128).unwrap_err();
    assert!(error.to_string().contains("block"), "{}", error);
    assert!(matches!(error, Error::Configuration(ConfigurationError::BlockNotMultipleOfAlignment { .. })));
}

#[test]
fn initialize_block_alignment() {
    install_subscriber();

    let allocator = FixedAllocator::<u32>::new(8, page_size()).expect("Valid allocator");

    let pool = allocator.pool();

    match OsPlatform::new().page_size() {
        Some(page_size) => {
            assert_eq!(page_size.value(), pool.block_alignment());
            assert!(!pool.was_block_alignment_defaulted());
        },
        None => {
            assert_eq!(fixpool::DEFAULT_BLOCK_ALIGNMENT.value(), pool.block_alignment());
            assert!(pool.was_block_alignment_defaulted());
        },
    }

    let base = pool.block_address(ptr::null()).expect("First block");
    assert_eq!(0, base.as_ptr() as usize % pool.block_alignment());
}

#[test]
fn release_foreign_pointer() {
    install_subscriber();

    let mut allocator = FixedAllocator::<u32>::new(8, page_size()).expect("Valid allocator");

    let mut foreign = Box::new(7u32);
    let pointer = NonNull::from(&mut *foreign);
    let mut handle = Some(pointer);

    //  Safety:
    //  -   The pointer is rejected, before being dereferenced.
    let error = unsafe { allocator.deallocate(&mut handle) }.unwrap_err();

    assert_eq!(Error::OutOfRange { address: pointer.as_ptr() as usize }, error);
    assert!(error.to_string().contains("does not belong"), "{}", error);
    assert_eq!(Some(pointer), handle);
    assert_eq!(7, *foreign);
}

#[test]
fn data_integrity_and_release() {
    install_subscriber();

    let mut allocator = FixedAllocator::<u32>::new(8, page_size()).expect("Valid allocator");

    let mut handle = Some(allocator.allocate(0).expect("Allocated"));

    //  Safety:
    //  -   The value is live, and not otherwise referenced.
    unsafe {
        let pointer = handle.unwrap().as_ptr();
        *pointer = 0x6989_aabb;

        let alias = pointer;
        assert_eq!(0x6989_aabb, *alias);
    }

    //  Safety:
    //  -   Allocated by `allocator`, not referenced any longer.
    assert_eq!(Ok(()), unsafe { allocator.deallocate(&mut handle) });
    assert_eq!(None, handle);

    //  Null handles are ignored.
    assert_eq!(Ok(()), unsafe { allocator.deallocate(&mut handle) });
    assert_eq!(None, handle);
}

#[test]
fn arguments_forwarded_to_value() {
    install_subscriber();

    #[derive(Debug, PartialEq)]
    struct Args {
        i0: u64,
        i1: u64,
        i2: u64,
        s: String,
    }

    let mut allocator = FixedAllocator::<Args>::for_type(page_size() * 3).expect("Valid allocator");

    assert!(allocator.chunk_size() >= mem::size_of::<Args>());

    let a0 = allocator.allocate(Args { i0: 0x45, i1: 0x32, i2: 0x10, s: "test string".to_string() }).unwrap();
    let a1 = allocator
        .allocate_with(|| Args { i0: 0x4454, i1: 0x31232, i2: 0x123320, s: "test second string".to_string() })
        .unwrap();

    assert_ne!(a0, a1);

    //  Safety:
    //  -   The values are live.
    unsafe {
        assert_eq!(Args { i0: 0x45, i1: 0x32, i2: 0x10, s: "test string".to_string() }, *a0.as_ptr());
        assert_eq!(Args { i0: 0x4454, i1: 0x31232, i2: 0x123320, s: "test second string".to_string() }, *a1.as_ptr());
    }

    let (mut a0, mut a1) = (Some(a0), Some(a1));

    //  Safety:
    //  -   Allocated by `allocator`, not referenced any longer.
    unsafe {
        assert_eq!(Ok(()), allocator.deallocate(&mut a0));
        assert_eq!(Ok(()), allocator.deallocate(&mut a1));
    }

    assert_eq!(None, a0);
    assert_eq!(None, a1);
}

#[test]
fn block_count_and_value_integrity() {
    install_subscriber();

    let chunks_per_block = page_size() / 8;

    let mut allocator = FixedAllocator::<u64>::new(8, page_size()).expect("Valid allocator");

    let mut values: Vec<(NonNull<u64>, u64)> = Vec::new();

    for value in 0..(chunks_per_block * 4) as u64 {
        let pointer = allocator.allocate(value).expect("Allocated");

        //  Safety:
        //  -   The values are live.
        unsafe {
            assert_eq!(value, *pointer.as_ptr());

            for (pointer, value) in &values {
                assert_eq!(*value, *pointer.as_ptr());
            }
        }

        values.push((pointer, value));
    }

    assert_eq!(4, allocator.pool().block_count());

    for (pointer, _) in values.drain(..chunks_per_block) {
        //  Safety:
        //  -   Allocated by `allocator`, not referenced any longer.
        assert_eq!(Ok(()), unsafe { allocator.deallocate(&mut Some(pointer)) });
    }

    assert_eq!(3, allocator.pool().block_count());

    for (pointer, value) in &values {
        //  Safety:
        //  -   The values are live.
        assert_eq!(*value, unsafe { *pointer.as_ptr() });
    }
}

#[test]
fn information_integrity() {
    install_subscriber();

    let block_size = page_size();
    let chunks_per_block = block_size / 8;

    let mut allocator = FixedAllocator::<u64>::new(8, block_size).expect("Valid allocator");

    for value in 0..chunks_per_block as u64 {
        let pointer = allocator.allocate(value).expect("Allocated").as_ptr();
        let pool = allocator.pool();

        let used = value as usize + 1;

        assert_eq!(Ok(chunks_per_block - used), pool.available_chunks_in_block(pointer));
        assert_eq!(Ok(used), pool.used_chunks_in_block(pointer));
        assert_eq!(Ok(block_size - used * 8), pool.available_space_in_block(pointer));
        assert_eq!(Ok(used * 8), pool.used_space_in_block(pointer));
    }

    assert_eq!(1, allocator.pool().block_count());
}

#[test]
fn free_list_initial() {
    install_subscriber();

    let (allocator, addresses) = free_list_fixture();

    let free_list = allocator.pool().dump_free_list(addresses[0].as_ptr()).expect("Within pool");

    assert_eq!(addresses.len(), free_list.len());

    for (index, (free, next)) in free_list.iter().enumerate() {
        assert_eq!(addresses[index], *free);
        assert_eq!(addresses.get(index + 1).copied(), *next);
    }
}

#[test]
fn free_list_sequential_allocation() {
    install_subscriber();

    let (mut allocator, addresses) = free_list_fixture();

    for address in &addresses {
        assert_eq!(*address, allocator.allocate(0).expect("Allocated"));
    }

    assert_eq!(Ok(vec![]), allocator.pool().dump_free_list(addresses[0].as_ptr()));
    assert_eq!(1, allocator.pool().block_count());
}

#[test]
fn free_list_single_release() {
    install_subscriber();

    let (mut allocator, addresses) = free_list_fixture();

    for _ in 0..addresses.len() {
        allocator.allocate(0).expect("Allocated");
    }

    let mut rng = StdRng::from_entropy();

    for _ in 0..1024 {
        let released = addresses[rng.gen_range(0..addresses.len())];
        let mut handle = Some(released);

        //  Safety:
        //  -   Allocated by `allocator`, not referenced any longer.
        unsafe { allocator.deallocate(&mut handle) }.expect("Released");

        assert_eq!(None, handle);

        let free_list = allocator.pool().dump_free_list(addresses[0].as_ptr()).expect("Within pool");
        assert_eq!(vec![(released, None)], free_list);

        assert_eq!(released, allocator.allocate(1).expect("Allocated"));
    }
}

#[test]
fn free_list_multiple_releases() {
    install_subscriber();

    let (mut allocator, addresses) = free_list_fixture();

    let mut rng = StdRng::from_entropy();

    for _ in 0..3 {
        for _ in 0..addresses.len() {
            allocator.allocate(0).expect("Allocated");
        }

        let mut path: Vec<usize> = (0..addresses.len()).collect();
        path.shuffle(&mut rng);

        for at in 1..=path.len() {
            //  Safety:
            //  -   Allocated by `allocator`, not referenced any longer.
            unsafe { allocator.deallocate(&mut Some(addresses[path[at - 1]])) }.expect("Released");

            let free_list = allocator.pool().dump_free_list(addresses[0].as_ptr()).expect("Within pool");
            assert_eq!(at, free_list.len());

            for (k, (free, next)) in free_list.iter().enumerate() {
                assert_eq!(addresses[path[at - 1 - k]], *free);

                let expected = if k == at - 1 { None } else { Some(addresses[path[at - 2 - k]]) };
                assert_eq!(expected, *next);
            }
        }
    }
}

#[test]
fn multiple_blocks() {
    install_subscriber();

    let block_size = page_size();

    let mut allocator = FixedAllocator::<usize>::new(block_size / 4, block_size).expect("Valid allocator");

    let values: [u64; 12] = [4, 44, 434, 453_764, 4_537_664, 4_537_661_224, 453_766_124, 45_376_614, 453_764, 4534, 454, 4];
    let pointers: Vec<_> = values.iter().map(|value| allocator.allocate(*value as usize).unwrap()).collect();

    assert_eq!(3, allocator.pool().block_count());

    let release = |allocator: &mut FixedAllocator<usize>, index: usize| {
        //  Safety:
        //  -   Allocated by `allocator`, not referenced any longer.
        assert_eq!(Ok(()), unsafe { allocator.deallocate(&mut Some(pointers[index])) });
    };

    for block in 0..3 {
        let base = block * 4;

        assert_eq!(Ok(0), allocator.pool().available_chunks_in_block(pointers[base].as_ptr()));
        release(&mut allocator, base + 1);
        assert_eq!(Ok(1), allocator.pool().available_chunks_in_block(pointers[base + 2].as_ptr()));
        release(&mut allocator, base + 3);
        assert_eq!(Ok(2), allocator.pool().available_chunks_in_block(pointers[base + 2].as_ptr()));
    }

    release(&mut allocator, 8);
    release(&mut allocator, 10);
    assert_eq!(2, allocator.pool().block_count());

    release(&mut allocator, 4);
    release(&mut allocator, 6);
    assert_eq!(1, allocator.pool().block_count());

    release(&mut allocator, 0);
    release(&mut allocator, 2);
    assert_eq!(1, allocator.pool().block_count());

    let base = allocator.pool().block_address(ptr::null()).expect("First block");
    assert_eq!(Ok(4), allocator.pool().available_chunks_in_block(base.as_ptr()));
}

#[test]
fn double_release_detected() {
    install_subscriber();

    let mut allocator = FixedAllocator::<u64>::new(8, page_size()).expect("Valid allocator");

    let _anchor = allocator.allocate(1).expect("Allocated");
    let pointer = allocator.allocate(2).expect("Allocated");

    //  Safety:
    //  -   Allocated by `allocator`, not referenced any longer; the second release is caught.
    unsafe {
        assert_eq!(Ok(()), allocator.deallocate(&mut Some(pointer)));
        assert_eq!(
            Err(Error::DoubleRelease { address: pointer.as_ptr() as usize }),
            allocator.deallocate(&mut Some(pointer))
        );
    }

    assert_eq!(Ok(1), allocator.pool().used_chunks_in_block(pointer.as_ptr()));
}

//
//  Implementation
//

fn install_subscriber() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

fn page_size() -> usize {
    OsPlatform::new().page_size().unwrap_or(fixpool::DEFAULT_BLOCK_ALIGNMENT).value()
}

//  Creates an allocator of 8 bytes chunks in blocks of 5 pages, along with the addresses of all the chunks of the
//  first block, in order.
fn free_list_fixture() -> (FixedAllocator<u8>, Vec<NonNull<u8>>) {
    const CHUNK_SIZE: usize = 8;

    let block_size = page_size() * 5;

    let allocator = FixedAllocator::<u8>::new(CHUNK_SIZE, block_size).expect("Valid allocator");

    let base = allocator.pool().block_address(ptr::null()).expect("First block");

    let addresses = (0..block_size / CHUNK_SIZE)
        .map(|i| NonNull::new(base.as_ptr().wrapping_add(i * CHUNK_SIZE)).expect("Not null"))
        .collect();

    (allocator, addresses)
}
