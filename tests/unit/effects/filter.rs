use super::*;

#[test]
fn grayscale_equalizes_channels_and_keeps_alpha() {
    let mut px = vec![255u8, 0, 0, 255, 0, 0, 0, 0, 10, 200, 30, 200];
    grayscale_in_place(&mut px);
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);
    assert_eq!(px[3], 255);
    assert_eq!(px[0], 54);
    assert_eq!(&px[4..8], &[0, 0, 0, 0]);
    assert!(px[8] <= 200);
    assert_eq!(px[11], 200);
}

#[test]
fn zero_sigma_blur_is_identity() {
    let mut src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
    let mut scratch = Vec::new();
    blur_in_place(&mut src, 1, 2, 0.0, &mut scratch).unwrap();
    assert_eq!(src, vec![1u8, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn blur_of_constant_image_is_identity() {
    let (w, h) = (6u32, 4u32);
    let px = [10u8, 20u8, 30u8, 40u8];
    let mut buf = px.repeat((w * h) as usize);
    let expected = buf.clone();
    let mut scratch = Vec::new();
    blur_in_place(&mut buf, w, h, 2.0, &mut scratch).unwrap();
    assert_eq!(buf, expected);
}

#[test]
fn blur_spreads_energy_from_single_pixel() {
    let (w, h) = (9u32, 9u32);
    let mut buf = vec![0u8; (w * h * 4) as usize];
    let center = ((4 * w + 4) * 4) as usize;
    buf[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    let mut scratch = Vec::new();
    blur_in_place(&mut buf, w, h, 1.0, &mut scratch).unwrap();

    let nonzero = buf.chunks_exact(4).filter(|px| px[3] != 0).count();
    assert!(nonzero > 1);
    let sum_a: u32 = buf.chunks_exact(4).map(|px| u32::from(px[3])).sum();
    assert!((sum_a as i32 - 255).abs() <= 30);
    assert!(buf[center + 3] < 255);
}

#[test]
fn blur_rejects_mismatched_buffer() {
    let mut buf = vec![0u8; 10];
    let mut scratch = Vec::new();
    assert!(blur_in_place(&mut buf, 2, 2, 1.0, &mut scratch).is_err());
}
