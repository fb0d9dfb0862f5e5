use super::*;
use crate::pack::{PackEntry, NO_ASSET};
use crate::resource::ResourceState;
use crate::test_utils::{self, ResourceFixture};

/// Material #0 with albedo #1 and normal #2
fn material_pack() -> Vec<PackEntry> {
    vec![
        PackEntry::new(0).with_header(test_utils::material_header(1, NO_ASSET, 2)),
        test_utils::image_entry(1, 4, 4, 0x11),
        test_utils::image_entry(2, 2, 2, 0x22),
    ]
}

fn streamed(fixture: &ResourceFixture) -> Arc<Material> {
    Arc::new(Material::create(&fixture.ctx, MaterialDesc::Asset(fixture.asset(0))).unwrap())
}

fn uniform_bytes(fixture: &ResourceFixture, material: &Material) -> Vec<u8> {
    fixture.device.lock().unwrap()
        .buffer_contents(&material.uniform_buffer().unwrap())
        .unwrap()
}

#[test]
fn test_maps_are_resolved_from_the_catalog() {
    let fixture = ResourceFixture::new(&material_pack());
    let material = streamed(&fixture);

    let maps = material.maps();
    assert!(maps.albedo.is_some());
    assert!(maps.surface.is_none());
    assert!(maps.normal.is_some());
    assert_eq!(maps.iter().count(), 2);
    assert_eq!(maps.albedo.as_ref().unwrap().desc().width, 4);
    assert_eq!(material.params().roughness, 0.7);
}

#[test]
fn test_material_waits_for_its_maps() {
    let fixture = ResourceFixture::new(&material_pack());
    let material = streamed(&fixture);

    // Own uniforms upload in the first frame; the maps only start loading
    // once the material tests its dependencies
    assert!(!fixture.request_until_ready(&material, 3));
    assert_eq!(material.header().state(), ResourceState::Waiting);
    assert!(material.uniform_buffer().is_some());
    assert!(!material.maps().albedo.as_ref().unwrap().header().is_ready());

    assert!(fixture.request_until_ready(&material, 6));
    assert!(material.maps().iter().all(|map| map.header().is_ready()));
}

#[test]
fn test_uniforms_follow_the_header() {
    let fixture = ResourceFixture::new(&material_pack());
    let material = streamed(&fixture);
    assert!(fixture.request_until_ready(&material, 10));

    let expected = MaterialUniform {
        color: [1.0, 0.5, 0.25, 1.0],
        metalness: 0.1,
        roughness: 0.7,
        reflectivity: 0.5,
        emissive: 0.0,
    };
    assert_eq!(uniform_bytes(&fixture, &material), bytemuck::bytes_of(&expected));
}

#[test]
fn test_failing_map_holds_material_back() {
    let fixture = ResourceFixture::new(&material_pack());
    fixture.device.lock().unwrap().fail_textures = true;
    let material = streamed(&fixture);

    assert!(!fixture.request_until_ready(&material, 10));
    assert_eq!(material.header().state(), ResourceState::Waiting);

    fixture.device.lock().unwrap().fail_textures = false;
    assert!(fixture.request_until_ready(&material, 10));
}

#[test]
fn test_missing_map_asset_is_rejected() {
    let fixture = ResourceFixture::new(&[
        PackEntry::new(0).with_header(test_utils::material_header(99, NO_ASSET, NO_ASSET)),
    ]);
    let result = Material::create(&fixture.ctx, MaterialDesc::Asset(fixture.asset(0)));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_in_memory_material_is_ready_at_creation() {
    let fixture = ResourceFixture::new(&[]);
    let params = MaterialParams { metalness: 1.0, ..MaterialParams::default() };
    let material = Material::create(&fixture.ctx, MaterialDesc::Params(params)).unwrap();

    assert!(material.header().is_ready());
    assert_eq!(
        uniform_bytes(&fixture, &material),
        bytemuck::bytes_of(&MaterialUniform::from(&params)),
    );
}

#[test]
fn test_update_params_rewrites_uniforms() {
    let fixture = ResourceFixture::new(&[]);
    let material = Material::create(&fixture.ctx, MaterialDesc::Params(MaterialParams::default())).unwrap();

    let params = MaterialParams { color: Vec4::new(0.0, 1.0, 0.0, 1.0), emissive: 3.0, ..MaterialParams::default() };
    material.update_params(&fixture.ctx, params).unwrap();

    assert_eq!(material.params(), params);
    assert_eq!(uniform_bytes(&fixture, &material), bytemuck::bytes_of(&MaterialUniform::from(&params)));
    assert_eq!(fixture.device.lock().unwrap().upload_count, 2);
}

#[test]
fn test_update_params_requires_ready_material() {
    let fixture = ResourceFixture::new(&material_pack());
    let material = streamed(&fixture);
    let result = material.update_params(&fixture.ctx, MaterialParams::default());
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_destroy_releases_maps() {
    let fixture = ResourceFixture::new(&material_pack());
    let material = streamed(&fixture);
    assert!(fixture.request_until_ready(&material, 10));
    assert_eq!(fixture.device.lock().unwrap().live_textures(), 2);

    material.destroy(&fixture.ctx);
    assert!(material.uniform_buffer().is_none());
    assert!(material.maps().iter().all(|map| map.device_texture().is_none()));
    assert_eq!(fixture.device.lock().unwrap().live_textures(), 0);
    assert_eq!(fixture.device.lock().unwrap().live_buffers(), 0);
}
