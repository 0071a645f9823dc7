//! The page-size constant is process-wide, so its mutators get a test
//! binary (and therefore a process) of their own. Within the binary the
//! tests are serialized because they all touch the same global.

use quarry::{page_size, reset_page_size, set_page_size, Page, PageId};
use serial_test::serial;

#[test]
#[serial]
fn override_applies_and_reset_restores() {
    set_page_size(512);
    assert_eq!(page_size(), 512);

    reset_page_size();
    assert_eq!(page_size(), 4096);
}

#[test]
#[serial]
fn pages_are_sized_from_the_constant() {
    set_page_size(256);
    let page = Page::zeroed(PageId::new(1, 0));
    assert_eq!(page.data().len(), 256);
    assert_eq!(page.before_image().len(), 256);

    // A buffer from the old size no longer constructs.
    let stale = vec![0u8; 4096].into_boxed_slice();
    assert!(Page::new(PageId::new(1, 1), stale).is_err());

    reset_page_size();
    assert_eq!(Page::zeroed(PageId::new(1, 2)).data().len(), 4096);
}
