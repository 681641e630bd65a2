//! Idle List Tests

use tidekv::network::IdleList;

#[test]
fn test_push_and_front() {
    let mut idle = IdleList::new();
    assert!(idle.is_empty());
    assert_eq!(idle.front(), None);

    idle.push_back(7);
    idle.push_back(3);
    idle.push_back(12);

    assert_eq!(idle.len(), 3);
    assert_eq!(idle.front(), Some(7));
    assert_eq!(idle.iter().collect::<Vec<_>>(), vec![7, 3, 12]);
}

#[test]
fn test_touch_moves_to_back() {
    let mut idle = IdleList::new();
    for key in [1, 2, 3] {
        idle.push_back(key);
    }

    idle.touch(1);
    assert_eq!(idle.iter().collect::<Vec<_>>(), vec![2, 3, 1]);
    idle.touch(3);
    assert_eq!(idle.iter().collect::<Vec<_>>(), vec![2, 1, 3]);
    // touching the tail changes nothing
    idle.touch(3);
    assert_eq!(idle.iter().collect::<Vec<_>>(), vec![2, 1, 3]);
    assert_eq!(idle.len(), 3);
}

#[test]
fn test_remove() {
    let mut idle = IdleList::new();
    for key in [4, 5, 6, 7] {
        idle.push_back(key);
    }

    assert!(idle.remove(5));
    assert!(!idle.remove(5));
    assert!(!idle.remove(100));
    assert!(idle.remove(4));
    assert!(idle.remove(7));

    assert_eq!(idle.iter().collect::<Vec<_>>(), vec![6]);
    assert_eq!(idle.front(), Some(6));
    assert!(idle.contains(6));
    assert!(!idle.contains(4));

    assert!(idle.remove(6));
    assert!(idle.is_empty());
    assert_eq!(idle.front(), None);
}

#[test]
fn test_reuse_after_remove() {
    let mut idle = IdleList::new();
    idle.push_back(9);
    idle.remove(9);
    idle.push_back(2);
    idle.push_back(9);

    assert_eq!(idle.iter().collect::<Vec<_>>(), vec![2, 9]);
}
