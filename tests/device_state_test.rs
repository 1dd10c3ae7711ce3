use ndarray::{Array2, Array3};
use optomask::device::{DeviceSpecRegistry, DeviceState, MaskBuffer};
use optomask::error::MaskError;
use optomask::sequence::{SequenceAllocator, SequenceTiming};

#[test]
fn test_unknown_model_produces_no_state() {
    for model in ["", "LCR-2500", "pluto", "SLM9000"] {
        let err = DeviceState::new(model).unwrap_err();
        assert!(matches!(err, MaskError::UnknownModel { .. }), "{model}");
    }
}

#[test]
fn test_every_registered_model_constructs_centered() {
    for (model, spec) in DeviceSpecRegistry::global().iter() {
        let state = DeviceState::new(model).unwrap();
        assert_eq!(state.reference(), spec.center_px());
        assert_eq!(state.mask().shape(), spec.resolution_px);
    }
}

#[test]
fn test_lcr2500_reference_example() {
    let mut state = DeviceState::new("LCR2500").unwrap();
    assert_eq!(state.resolution_px(), (1024, 768));
    assert_eq!(state.reference(), (512, 384));

    let err = state.update_reference((600, 0)).unwrap_err();
    assert!(matches!(err, MaskError::OutOfBounds { target: (1112, 384), .. }));
    assert_eq!(state.reference(), (512, 384));
}

#[test]
fn test_shifts_accumulate_and_stay_in_bounds() {
    let mut state = DeviceState::new("PLUTO").unwrap();
    let start = state.reference();
    let shifts: [(i64, i64); 8] = [
        (100, 50),
        (-2000, 0), // rejected
        (-300, -20),
        (0, 600),   // rejected
        (1160, 0),  // x lands exactly on the edge
        (1, 0),     // rejected
        (-5, 510),
        (0, 1),     // rejected
    ];

    let mut expected = start;
    for shift in shifts {
        if state.update_reference(shift).is_ok() {
            expected = (expected.0 + shift.0, expected.1 + shift.1);
        }
        let (x, y) = state.reference();
        assert_eq!((x, y), expected);
        assert!(x > 0 && x <= 1920);
        assert!(y > 0 && y <= 1080);
    }
    assert_eq!(state.reference(), (1915, 1080));
}

#[test]
fn test_inversion_example() {
    let mut state = DeviceState::new("LCR2500").unwrap();
    state.update_inversion((1, -1)).unwrap();
    assert_eq!(state.inversion(), (1, -1));

    let err = state.update_inversion((2, 1)).unwrap_err();
    assert_eq!(err, MaskError::InvalidInversion(2, 1));
    assert_eq!(state.inversion(), (1, -1));

    assert!(state.update_inversion((0, 0)).is_err());
    assert_eq!(state.inversion(), (1, -1));
}

#[test]
fn test_blank_mask_is_idempotent() {
    let mut state = DeviceState::new("LC2012").unwrap();
    state.update_mask(Array2::<i32>::ones((1024, 768))).unwrap();

    state.blank_mask();
    let first = state.mask().clone();
    state.blank_mask();
    assert_eq!(state.mask(), &first);
    assert_eq!(first, MaskBuffer::zeros((1024, 768)));
}

#[test]
fn test_update_mask_round_trip() {
    let mut state = DeviceState::new("LCR2500").unwrap();
    let mask = Array2::from_shape_fn((1024, 768), |(x, y)| ((x * 3 + y) % 256) as f32 / 255.0);
    state.update_mask(mask.clone()).unwrap();
    assert_eq!(state.mask(), &MaskBuffer::from(mask));
}

#[test]
fn test_rejected_mask_leaves_state_unchanged() {
    let mut state = DeviceState::new("LCR2500").unwrap();
    let good = Array2::<i8>::ones((1024, 768));
    state.update_mask(good.clone()).unwrap();

    assert!(state.update_mask(Array2::<bool>::from_elem((1024, 768), true)).is_err());
    assert!(state.update_mask(Array2::<u16>::zeros((1024, 768))).is_err());
    assert!(state.update_mask(Array2::<i8>::ones((1024, 767))).is_err());
    assert_eq!(state.mask(), &MaskBuffer::from(good));
}

#[test]
fn test_sequence_atomicity_example() {
    let allocator = SequenceAllocator::default();
    let timing = SequenceTiming::new(20_000, 15_000);

    let mut masks = Array3::<f64>::zeros((5, 768, 1024));
    masks[[2, 400, 500]] = 1.5;
    let err = allocator.allocate(masks.view(), timing).unwrap_err();
    assert_eq!(err, MaskError::InvalidMaskValues { frame: 2, value: 1.5 });

    masks[[2, 400, 500]] = 1.0;
    let sequence = allocator.allocate(masks.view(), timing).unwrap();
    assert_eq!(sequence.frame_count(), 5);
    assert_eq!(sequence.payload().len(), 5 * 768 * 1024);
    assert_eq!(sequence.frame(2).unwrap()[400 * 1024 + 500], 255);
}
